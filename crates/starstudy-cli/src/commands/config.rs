use clap::Subcommand;
use serde_json::Value;
use starstudy_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting, e.g. `remote.endpoint` or `session.tick_interval_ms`
    Get { key: String },
    /// Change one setting; an empty value clears an optional one
    Set { key: String, value: String },
    /// Print every setting as `key = value`
    List {
        /// Print the whole config as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Print where config.toml lives
    Path,
    /// Restore defaults, keeping the cache secret unless --all is given
    Reset {
        /// Also forget storage.secret; the existing cache becomes unreadable
        #[arg(long)]
        all: bool,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            Config::load()?.set(&key, &value)?;
            println!("{key} updated");
        }
        ConfigAction::List { json } => {
            let value = serde_json::to_value(Config::load()?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for (key, value) in flatten(&value) {
                    println!("{key} = {value}");
                }
            }
        }
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset { all } => {
            let secret = if all { None } else { Config::load()?.storage.secret };
            let mut config = Config::default();
            config.storage.secret = secret;
            config.save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

/// Dot-path leaves of a config value. Secrets are masked.
fn flatten(value: &Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
        match value {
            Value::Object(fields) => {
                for (name, inner) in fields {
                    let key = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    walk(&key, inner, out);
                }
            }
            Value::Null => out.push((prefix.to_string(), "(unset)".into())),
            Value::String(_) if prefix.ends_with("secret") || prefix.ends_with("api_key") => {
                out.push((prefix.to_string(), "********".into()))
            }
            Value::String(s) => out.push((prefix.to_string(), s.clone())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }
    let mut out = Vec::new();
    walk("", value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_yields_dot_paths() {
        let rows = flatten(&json!({
            "remote": {"endpoint": null, "timeout_secs": 10},
            "session": {"tick_interval_ms": 1000},
        }));
        assert!(rows.contains(&("remote.endpoint".into(), "(unset)".into())));
        assert!(rows.contains(&("remote.timeout_secs".into(), "10".into())));
        assert!(rows.contains(&("session.tick_interval_ms".into(), "1000".into())));
    }

    #[test]
    fn flatten_masks_credentials() {
        let rows = flatten(&json!({
            "storage": {"secret": "hunter22", "roster_key": "children"},
            "remote": {"api_key": "k3y"},
        }));
        assert!(rows.contains(&("storage.secret".into(), "********".into())));
        assert!(rows.contains(&("remote.api_key".into(), "********".into())));
        assert!(rows.contains(&("storage.roster_key".into(), "children".into())));
    }
}
