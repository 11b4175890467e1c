use std::cmp::Ordering;

use tracing::{debug, info, warn};

use super::{Confirm, DeleteOutcome, LoadOutcome, LocalOnlyReason, StarOutcome, SyncOutcome};
use crate::auth::{account, Principal};
use crate::context::AppContext;
use crate::error::{CoreError, RemoteError, StoreError};
use crate::remote::decode_records;
use crate::roster::{Child, ChildDraft, Parent, CHILDREN_COLLECTION};

/// Owner of the in-memory roster.
///
/// Every mutation updates memory first and leaves the encrypted cache
/// equal to memory when it returns, whatever the remote did. Remote
/// calls are only made while a parent is signed in.
pub struct SyncCoordinator {
    ctx: AppContext,
    roster: Vec<Child>,
    parent: Option<Parent>,
}

impl SyncCoordinator {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            roster: Vec::new(),
            parent: None,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn roster(&self) -> &[Child] {
        &self.roster
    }

    pub fn child(&self, id: &str) -> Option<&Child> {
        self.roster.iter().find(|c| c.id == id)
    }

    pub fn parent(&self) -> Option<&Parent> {
        self.parent.as_ref()
    }

    /// Read the cached roster for immediate display. A missing or
    /// unreadable cache yields an empty roster.
    pub fn load_local(&mut self) -> Result<usize, StoreError> {
        self.roster = self
            .ctx
            .local
            .get::<Vec<Child>>(&self.ctx.roster_key)?
            .unwrap_or_default();
        debug!(children = self.roster.len(), "roster loaded from cache");
        Ok(self.roster.len())
    }

    /// React to a principal change.
    ///
    /// With a principal, fetch its parent record and roster from the
    /// remote, replace the in-memory roster and refresh the cache. If
    /// the fetch fails the current roster stays in place and the user is
    /// told cloud data could not be loaded. Without one, forget the
    /// parent; the roster is left for [`SyncCoordinator::clear`].
    pub async fn on_principal_changed(&mut self, principal: Option<&Principal>) -> Result<LoadOutcome, CoreError> {
        let Some(principal) = principal else {
            self.parent = None;
            return Ok(LoadOutcome::SignedOut);
        };

        match self.fetch_remote(principal).await {
            Ok((parent, children)) => {
                info!(uid = %parent.id, children = children.len(), "roster loaded from remote");
                self.ctx
                    .notifier
                    .success(format!("Welcome, {}!", parent.display_name()));
                self.parent = Some(parent);
                self.roster = children;
                self.persist()?;
                Ok(LoadOutcome::Loaded {
                    children: self.roster.len(),
                })
            }
            Err(e) => {
                warn!(uid = %principal.uid, error = %e, "could not load cloud data");
                self.parent = Some(account::default_parent(principal));
                self.ctx
                    .notifier
                    .error("Could not load cloud data. Showing what is saved on this device.");
                Ok(LoadOutcome::LocalOnly { reason: e })
            }
        }
    }

    async fn fetch_remote(&self, principal: &Principal) -> Result<(Parent, Vec<Child>), RemoteError> {
        let parent = account::resolve_parent(&self.ctx, principal).await?;
        let records = self
            .ctx
            .remote
            .query(CHILDREN_COLLECTION, Some(&principal.uid))
            .await?;
        let mut children: Vec<Child> = decode_records(records);
        children.sort_by(|a, b| match a.created_at.cmp(&b.created_at) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        });
        Ok((parent, children))
    }

    /// Append a new child built from `draft`.
    ///
    /// # Errors
    /// Validation of the draft, or a failed cache write.
    pub async fn add_child(&mut self, draft: ChildDraft) -> Result<(Child, SyncOutcome), CoreError> {
        let owner = self.parent.as_ref().map(|p| p.id.clone()).unwrap_or_default();
        let child = draft.into_child(&owner)?;
        self.roster.push(child.clone());

        let sync = self.push_child(&child).await?;
        self.persist()?;

        if sync.remote_failed() {
            self.ctx
                .notifier
                .error(format!("{} was saved on this device only.", child.name));
        } else {
            self.ctx.notifier.success(format!("{} was added.", child.name));
        }
        info!(child_id = %child.id, synced = sync.is_synced(), "child added");
        Ok((child, sync))
    }

    /// Remove a child after confirmation. Unknown ids are a no-op and
    /// are not confirmed.
    pub async fn delete_child(&mut self, id: &str, confirm: &dyn Confirm) -> Result<DeleteOutcome, CoreError> {
        let Some(child) = self.child(id) else {
            debug!(child_id = %id, "delete of unknown child ignored");
            return Ok(DeleteOutcome::NotFound);
        };
        let name = child.name.clone();
        if !confirm.confirm(&format!("Delete {name}? This cannot be undone.")) {
            return Ok(DeleteOutcome::Declined);
        }

        let sync = match self.parent {
            Some(_) => SyncOutcome::from_remote(self.ctx.remote.delete(CHILDREN_COLLECTION, id).await),
            None => signed_out(),
        };
        self.roster.retain(|c| c.id != id);
        self.persist()?;

        if sync.remote_failed() {
            self.ctx
                .notifier
                .error(format!("{name} was removed from this device only."));
        } else {
            self.ctx.notifier.info(format!("{name} was removed."));
        }
        info!(child_id = %id, synced = sync.is_synced(), "child deleted");
        Ok(DeleteOutcome::Deleted(sync))
    }

    /// Add one star. The cache is written before the remote is tried.
    pub async fn add_star(&mut self, id: &str) -> Result<StarOutcome, CoreError> {
        let Some(child) = self.roster.iter_mut().find(|c| c.id == id) else {
            return Ok(StarOutcome::NotFound);
        };
        child.stars = child.stars.saturating_add(1);
        let child = child.clone();
        self.persist()?;

        let sync = self.push_child(&child).await?;
        if sync.remote_failed() {
            self.ctx
                .notifier
                .error(format!("Star for {} was saved on this device only.", child.name));
        } else {
            self.ctx
                .notifier
                .success(format!("{} earned a star! Total: {}", child.name, child.stars));
        }
        info!(child_id = %id, stars = child.stars, synced = sync.is_synced(), "star awarded");
        Ok(StarOutcome::Awarded {
            stars: child.stars,
            sync,
        })
    }

    /// Forget the parent and the in-memory roster. The cache is kept
    /// for the next start.
    pub fn clear(&mut self) {
        self.parent = None;
        self.roster.clear();
    }

    async fn push_child(&self, child: &Child) -> Result<SyncOutcome, CoreError> {
        let Some(parent) = &self.parent else {
            return Ok(signed_out());
        };
        let record = serde_json::to_value(child)?;
        let result = self
            .ctx
            .remote
            .save(CHILDREN_COLLECTION, Some(&child.id), Some(&parent.id), record)
            .await
            .map(|_| ());
        if let Err(e) = &result {
            warn!(child_id = %child.id, error = %e, "remote save failed, continuing locally");
        }
        Ok(SyncOutcome::from_remote(result))
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.ctx.local.put(&self.ctx.roster_key, &self.roster)
    }
}

fn signed_out() -> SyncOutcome {
    SyncOutcome::LocalOnly {
        reason: LocalOnlyReason::SignedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryAuthProvider;
    use crate::notify::NotificationKind;
    use crate::remote::{DocumentStore, MemoryDocumentStore};
    use crate::storage::{EncryptedStore, MemoryKv};
    use std::sync::Arc;

    fn coordinator() -> (SyncCoordinator, Arc<MemoryDocumentStore>) {
        let remote = Arc::new(MemoryDocumentStore::new());
        let local = EncryptedStore::new(Box::new(MemoryKv::new()), "test-secret").unwrap();
        let ctx = AppContext::new(remote.clone(), Arc::new(MemoryAuthProvider::new()), local);
        (SyncCoordinator::new(ctx), remote)
    }

    fn principal() -> Principal {
        Principal {
            uid: "p1".into(),
            email: "a@test.com".into(),
            email_verified: true,
        }
    }

    fn cached(coord: &SyncCoordinator) -> Vec<Child> {
        coord
            .context()
            .local
            .get::<Vec<Child>>(&coord.context().roster_key)
            .unwrap()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn add_child_signed_in_syncs_and_caches() {
        let (mut coord, remote) = coordinator();
        coord.on_principal_changed(Some(&principal())).await.unwrap();
        let (child, sync) = coord
            .add_child(ChildDraft::new("Lina").subject("Math", 25).unwrap())
            .await
            .unwrap();
        assert_eq!(sync, SyncOutcome::Synced);
        assert_eq!(child.parent_id, "p1");
        assert_eq!(remote.record(CHILDREN_COLLECTION, &child.id).unwrap()["name"], "Lina");
        assert_eq!(cached(&coord), coord.roster());
    }

    #[tokio::test]
    async fn add_child_remote_down_keeps_local_and_warns() {
        let (mut coord, remote) = coordinator();
        coord.on_principal_changed(Some(&principal())).await.unwrap();
        remote.set_available(false);
        let mut rx = coord.context().notifier.subscribe();

        let (_, sync) = coord.add_child(ChildDraft::new("Omar")).await.unwrap();
        assert!(matches!(
            sync,
            SyncOutcome::LocalOnly {
                reason: LocalOnlyReason::Remote(_)
            }
        ));
        assert_eq!(coord.roster().len(), 1);
        assert_eq!(cached(&coord), coord.roster());
        assert_eq!(rx.try_recv().unwrap().kind, NotificationKind::Error);
    }

    #[tokio::test]
    async fn signed_out_mutations_stay_local_without_error_banner() {
        let (mut coord, remote) = coordinator();
        let mut rx = coord.context().notifier.subscribe();
        let (child, sync) = coord.add_child(ChildDraft::new("Sara")).await.unwrap();
        assert_eq!(
            sync,
            SyncOutcome::LocalOnly {
                reason: LocalOnlyReason::SignedOut
            }
        );
        assert_eq!(child.parent_id, "");
        assert_eq!(remote.calls(), 0);
        assert_eq!(rx.try_recv().unwrap().kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let (mut coord, _) = coordinator();
        let (child, _) = coord.add_child(ChildDraft::new("Sara")).await.unwrap();

        let outcome = coord.delete_child(&child.id, &false).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Declined);
        assert_eq!(coord.roster().len(), 1);

        let outcome = coord.delete_child(&child.id, &true).await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
        assert!(coord.roster().is_empty());
        assert!(cached(&coord).is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_id_is_a_silent_no_op() {
        let (mut coord, remote) = coordinator();
        coord.on_principal_changed(Some(&principal())).await.unwrap();
        coord.add_child(ChildDraft::new("Sara")).await.unwrap();
        let before = cached(&coord);
        let calls = remote.calls();

        let asked = std::cell::Cell::new(false);
        let gate = |_: &str| {
            asked.set(true);
            true
        };
        let outcome = coord.delete_child("missing", &gate).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert!(!asked.get());
        assert_eq!(cached(&coord), before);
        assert_eq!(remote.calls(), calls);
    }

    #[tokio::test]
    async fn star_is_cached_even_when_remote_rejects() {
        let (mut coord, remote) = coordinator();
        coord.on_principal_changed(Some(&principal())).await.unwrap();
        let (child, _) = coord.add_child(ChildDraft::new("Lina")).await.unwrap();
        remote.set_reject_writes(true);

        let outcome = coord.add_star(&child.id).await.unwrap();
        let StarOutcome::Awarded { stars, sync } = outcome else {
            panic!("expected an award");
        };
        assert_eq!(stars, 1);
        assert!(!sync.is_synced());
        assert_eq!(cached(&coord)[0].stars, 1);
        assert_eq!(remote.record(CHILDREN_COLLECTION, &child.id).unwrap()["stars"], 0);
        assert_eq!(coord.add_star("nope").await.unwrap(), StarOutcome::NotFound);
    }

    #[tokio::test]
    async fn principal_change_replaces_roster_from_remote() {
        let (mut coord, remote) = coordinator();
        coord.add_child(ChildDraft::new("Stale")).await.unwrap();
        let remote_child = ChildDraft::new("Remote").into_child("p1").unwrap();
        remote
            .save(
                CHILDREN_COLLECTION,
                Some(&remote_child.id),
                Some("p1"),
                serde_json::to_value(&remote_child).unwrap(),
            )
            .await
            .unwrap();

        let outcome = coord.on_principal_changed(Some(&principal())).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { children: 1 });
        assert_eq!(coord.roster()[0].name, "Remote");
        assert_eq!(cached(&coord), coord.roster());
        assert_eq!(coord.parent().unwrap().name, "a@test.com");
    }

    #[tokio::test]
    async fn failed_remote_load_keeps_local_roster() {
        let (mut coord, remote) = coordinator();
        coord.add_child(ChildDraft::new("Local")).await.unwrap();
        remote.set_available(false);

        let outcome = coord.on_principal_changed(Some(&principal())).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::LocalOnly { .. }));
        assert_eq!(coord.roster()[0].name, "Local");
        assert_eq!(coord.parent().unwrap().id, "p1");
        assert_eq!(
            coord.context().notifier.current().unwrap().kind,
            NotificationKind::Error
        );
    }

    #[tokio::test]
    async fn load_local_reads_cache_and_clear_forgets_memory_only() {
        let (mut coord, _) = coordinator();
        coord.add_child(ChildDraft::new("A")).await.unwrap();
        coord.add_child(ChildDraft::new("B")).await.unwrap();
        coord.clear();
        assert!(coord.roster().is_empty());
        assert_eq!(coord.load_local().unwrap(), 2);
        assert_eq!(coord.roster()[1].name, "B");
    }
}
