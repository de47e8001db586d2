use chrono::{DateTime, Duration, Utc};
use log::info;

use super::registry::DeviceRegistry;
use super::router::NotificationRouter;
use crate::domain::item::{CutState, Item};
use crate::error::{Error, Result};
use crate::infrastructure::storage::ItemStore;
use crate::message::ServerMessage;

/// Result of one paste acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    /// Devices still expected to acknowledge.
    Pending(Vec<String>),
    /// The pending set drained; the item is gone.
    Deleted,
}

enum Resolved {
    Pending { owner: String, pending: Vec<String> },
    Deleted { owner: String, removed: Item },
}

/// Upper bound on a cut's time-to-live (one year). Anything larger is a
/// client error; unchecked values would overflow the deadline arithmetic.
pub const MAX_CUT_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Owns the cut lifecycle state machine.
///
/// States per item: Free (no cut) → Cut (pending non-empty) → Free again via
/// expiry, or Deleted via full acknowledgment or explicit delete. Every
/// transition runs inside the store's transactional update path, so
/// acknowledgments and the expiry sweep serialize per item and a double
/// transition (clearing a deleted item, deleting a cleared cut) cannot
/// happen.
#[derive(Clone)]
pub struct CutCoordinator {
    store: ItemStore,
    registry: DeviceRegistry,
    router: NotificationRouter,
}

impl CutCoordinator {
    pub fn new(store: ItemStore, registry: DeviceRegistry, router: NotificationRouter) -> Self {
        Self {
            store,
            registry,
            router,
        }
    }

    /// Mark a Free item as cut.
    ///
    /// The pending set is every known device except the owner, including
    /// devices currently offline; they may reconnect before the deadline.
    /// An item already in flight cannot be re-cut; the caller waits for
    /// completion or expiry.
    pub async fn create_cut(&self, item_id: &str, owner: &str, ttl_seconds: u64) -> Result<Item> {
        if owner.trim().is_empty() {
            return Err(Error::validation("owner device id required"));
        }
        if ttl_seconds > MAX_CUT_TTL_SECONDS {
            return Err(Error::validation(format!(
                "ttlSeconds must be at most {}",
                MAX_CUT_TTL_SECONDS
            )));
        }

        let pending: Vec<String> = self
            .registry
            .known_ids()
            .await
            .into_iter()
            .filter(|id| id != owner)
            .collect();
        let deadline = Utc::now() + Duration::seconds(ttl_seconds as i64);
        let cut = CutState::new(owner.to_string(), pending, deadline);

        let updated = self
            .store
            .update(item_id, move |item| {
                if item.cut.is_some() {
                    return Err(Error::invalid_state(format!(
                        "item {} is already cut",
                        item.id
                    )));
                }
                item.cut = Some(cut);
                Ok(())
            })
            .await?;

        if let Some(cut) = updated.cut.clone() {
            info!(
                "Item {} cut by {}, {} device(s) pending",
                item_id,
                owner,
                cut.pending.len()
            );
            self.router
                .broadcast(&ServerMessage::CutCreated {
                    item_id: updated.id.clone(),
                    cut,
                })
                .await;
        }
        Ok(updated)
    }

    /// Record one device's paste acknowledgment.
    ///
    /// Idempotent per device: re-acknowledging after removal is a no-op that
    /// returns the unchanged pending set. Draining the last pending device
    /// deletes the item exactly once; the decision and the removal happen in
    /// the same store transaction.
    pub async fn acknowledge(
        &self,
        item_id: &str,
        device_id: &str,
        token: &str,
    ) -> Result<AckOutcome> {
        if device_id.trim().is_empty() || token.trim().is_empty() {
            return Err(Error::validation("deviceId and token required"));
        }

        let resolved = self
            .store
            .mutate(|items| {
                let idx = items
                    .iter()
                    .position(|it| it.id == item_id)
                    .ok_or_else(|| Error::not_found(format!("item {}", item_id)))?;
                let cut = items[idx]
                    .cut
                    .as_mut()
                    .ok_or_else(|| Error::not_found(format!("no open cut for item {}", item_id)))?;
                if cut.token != token {
                    return Err(Error::TokenMismatch);
                }
                cut.pending.retain(|d| d != device_id);
                let owner = cut.owner.clone();
                let pending = cut.pending.clone();
                if pending.is_empty() {
                    let removed = items.remove(idx);
                    Ok(Resolved::Deleted { owner, removed })
                } else {
                    Ok(Resolved::Pending { owner, pending })
                }
            })
            .await?;

        match resolved {
            Resolved::Pending { owner, pending } => {
                self.router
                    .notify(
                        &owner,
                        &ServerMessage::PasteAck {
                            item_id: item_id.to_string(),
                            device_id: device_id.to_string(),
                            pending: pending.clone(),
                        },
                    )
                    .await;
                Ok(AckOutcome::Pending(pending))
            }
            Resolved::Deleted { owner, removed } => {
                self.store.remove_blob(&removed);
                self.router
                    .notify(
                        &owner,
                        &ServerMessage::PasteAck {
                            item_id: item_id.to_string(),
                            device_id: device_id.to_string(),
                            pending: Vec::new(),
                        },
                    )
                    .await;
                self.router
                    .broadcast(&ServerMessage::ItemDeleted {
                        item_id: item_id.to_string(),
                    })
                    .await;
                info!("Item {} fully acknowledged, deleted", item_id);
                Ok(AckOutcome::Deleted)
            }
        }
    }

    /// Clear every cut whose deadline has passed.
    ///
    /// Expiry means the recipients failed to confirm, not that the content
    /// is gone: the cut field is cleared and the item stays listable; the
    /// owner may re-cut later. Returns the ids actually cleared, so a second
    /// sweep over the same state reports nothing and fires no duplicate
    /// events.
    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let overdue: Vec<String> = self
            .store
            .list()
            .await
            .into_iter()
            .filter(|it| it.cut.as_ref().map_or(false, |c| c.is_expired(now)))
            .map(|it| it.id)
            .collect();

        let mut expired = Vec::new();
        for item_id in overdue {
            // Re-checked under the store lock: a racing acknowledgment may
            // have deleted the item or a racing ack/re-cut changed the cut.
            // Either way the stale observation becomes a no-op.
            let cleared = self
                .store
                .mutate(|items| {
                    let Some(item) = items.iter_mut().find(|it| it.id == item_id) else {
                        return Ok(false);
                    };
                    match &item.cut {
                        Some(cut) if cut.is_expired(now) => {
                            item.cut = None;
                            Ok(true)
                        }
                        _ => Ok(false),
                    }
                })
                .await?;

            if cleared {
                info!("Cut on item {} expired", item_id);
                self.router
                    .broadcast(&ServerMessage::CutExpired {
                        item_id: item_id.clone(),
                    })
                    .await;
                expired.push(item_id);
            }
        }
        Ok(expired)
    }

    /// Device-initiated delete; terminal from any state.
    pub async fn delete_item(&self, item_id: &str) -> Result<()> {
        self.store.delete(item_id).await?;
        self.router
            .broadcast(&ServerMessage::ItemDeleted {
                item_id: item_id.to_string(),
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        coordinator: CutCoordinator,
        store: ItemStore,
        registry: DeviceRegistry,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();
        let registry = DeviceRegistry::new();
        let router = NotificationRouter::new(registry.clone());
        let coordinator = CutCoordinator::new(store.clone(), registry.clone(), router);
        Harness {
            coordinator,
            store,
            registry,
            _dir: dir,
        }
    }

    async fn connect(registry: &DeviceRegistry, id: &str) -> UnboundedReceiver<ServerMessage> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        registry.register(id, id, tx).await;
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_pending_set_is_known_ids_minus_owner() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;
        let _rx_c = connect(&h.registry, "c").await;
        h.registry.disconnect("c").await;

        let item = h.store.add_text("hello").await.unwrap();
        let cut_item = h.coordinator.create_cut(&item.id, "a", 300).await.unwrap();
        let cut = cut_item.cut.unwrap();

        assert_eq!(cut.owner, "a");
        // Offline c is still expected to acknowledge.
        assert_eq!(cut.pending, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_cut_requires_free_item_and_owner() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let item = h.store.add_text("x").await.unwrap();

        let err = h.coordinator.create_cut(&item.id, " ", 300).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = h.coordinator.create_cut("missing", "a", 300).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        h.coordinator.create_cut(&item.id, "a", 300).await.unwrap();
        let err = h.coordinator.create_cut(&item.id, "a", 300).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_cut_rejects_out_of_range_ttl() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;
        let item = h.store.add_text("x").await.unwrap();

        // Deadline arithmetic must never be reached with an absurd ttl.
        let err = h
            .coordinator
            .create_cut(&item.id, "a", 9_300_000_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = h
            .coordinator
            .create_cut(&item.id, "a", MAX_CUT_TTL_SECONDS + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // The item stays Free and can still be cut with a sane ttl.
        assert!(h.store.get(&item.id).await.unwrap().cut.is_none());
        h.coordinator
            .create_cut(&item.id, "a", MAX_CUT_TTL_SECONDS)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_acknowledgment_deletes_exactly_once() {
        let h = harness();
        let mut rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;
        let _rx_c = connect(&h.registry, "c").await;

        let item = h.store.add_text("hello").await.unwrap();
        let cut = h
            .coordinator
            .create_cut(&item.id, "a", 300)
            .await
            .unwrap()
            .cut
            .unwrap();

        let first = h
            .coordinator
            .acknowledge(&item.id, "c", &cut.token)
            .await
            .unwrap();
        assert_eq!(first, AckOutcome::Pending(vec!["b".to_string()]));
        assert!(h.store.get(&item.id).await.is_some());

        let second = h
            .coordinator
            .acknowledge(&item.id, "b", &cut.token)
            .await
            .unwrap();
        assert_eq!(second, AckOutcome::Deleted);
        assert!(h.store.get(&item.id).await.is_none());

        // A further ack sees no cut at all.
        let err = h
            .coordinator
            .acknowledge(&item.id, "b", &cut.token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // The owner saw each ack and exactly one deletion event.
        let events = drain(&mut rx_a);
        let deletions = events
            .iter()
            .filter(|e| matches!(e, ServerMessage::ItemDeleted { .. }))
            .count();
        let acks = events
            .iter()
            .filter(|e| matches!(e, ServerMessage::PasteAck { .. }))
            .count();
        assert_eq!(deletions, 1);
        assert_eq!(acks, 2);
    }

    #[tokio::test]
    async fn test_token_mismatch_never_mutates_pending() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;

        let item = h.store.add_text("x").await.unwrap();
        h.coordinator.create_cut(&item.id, "a", 300).await.unwrap();

        let err = h
            .coordinator
            .acknowledge(&item.id, "b", "forged-token")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenMismatch));

        let cut = h.store.get(&item.id).await.unwrap().cut.unwrap();
        assert_eq!(cut.pending, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent_per_device() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;
        let _rx_c = connect(&h.registry, "c").await;

        let item = h.store.add_text("x").await.unwrap();
        let cut = h
            .coordinator
            .create_cut(&item.id, "a", 300)
            .await
            .unwrap()
            .cut
            .unwrap();

        h.coordinator
            .acknowledge(&item.id, "b", &cut.token)
            .await
            .unwrap();
        // Same device again: no-op, unchanged pending, not an error.
        let outcome = h
            .coordinator
            .acknowledge(&item.id, "b", &cut.token)
            .await
            .unwrap();
        assert_eq!(outcome, AckOutcome::Pending(vec!["c".to_string()]));

        // A device that was never pending is the same no-op.
        let outcome = h
            .coordinator
            .acknowledge(&item.id, "stranger", &cut.token)
            .await
            .unwrap();
        assert_eq!(outcome, AckOutcome::Pending(vec!["c".to_string()]));
    }

    #[tokio::test]
    async fn test_expire_clears_cut_but_keeps_item() {
        let h = harness();
        let mut rx_b = connect(&h.registry, "b").await;
        let _rx_a = connect(&h.registry, "a").await;

        let item = h.store.add_text("x").await.unwrap();
        let cut = h
            .coordinator
            .create_cut(&item.id, "a", 1)
            .await
            .unwrap()
            .cut
            .unwrap();

        let later = cut.deadline + Duration::seconds(1);
        let expired = h.coordinator.expire_sweep(later).await.unwrap();
        assert_eq!(expired, vec![item.id.clone()]);

        let listed = h.store.get(&item.id).await.unwrap();
        assert!(listed.cut.is_none());

        // Second sweep over the now-Free item: idempotent, no new events.
        drain(&mut rx_b);
        let expired = h.coordinator.expire_sweep(later).await.unwrap();
        assert!(expired.is_empty());
        assert!(!drain(&mut rx_b)
            .iter()
            .any(|e| matches!(e, ServerMessage::CutExpired { .. })));
    }

    #[tokio::test]
    async fn test_sweep_ignores_unexpired_cuts() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;

        let item = h.store.add_text("x").await.unwrap();
        h.coordinator.create_cut(&item.id, "a", 300).await.unwrap();

        let expired = h.coordinator.expire_sweep(Utc::now()).await.unwrap();
        assert!(expired.is_empty());
        assert!(h.store.get(&item.id).await.unwrap().cut.is_some());
    }

    #[tokio::test]
    async fn test_recut_mints_fresh_token_invalidating_old_acks() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;

        let item = h.store.add_text("x").await.unwrap();
        let old_cut = h
            .coordinator
            .create_cut(&item.id, "a", 1)
            .await
            .unwrap()
            .cut
            .unwrap();
        h.coordinator
            .expire_sweep(old_cut.deadline + Duration::seconds(1))
            .await
            .unwrap();

        let new_cut = h
            .coordinator
            .create_cut(&item.id, "a", 300)
            .await
            .unwrap()
            .cut
            .unwrap();
        assert_ne!(old_cut.token, new_cut.token);

        let err = h
            .coordinator
            .acknowledge(&item.id, "b", &old_cut.token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenMismatch));
    }

    #[tokio::test]
    async fn test_concurrent_acks_delete_after_the_second() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;
        let _rx_c = connect(&h.registry, "c").await;

        let item = h.store.add_text("x").await.unwrap();
        let cut = h
            .coordinator
            .create_cut(&item.id, "a", 300)
            .await
            .unwrap()
            .cut
            .unwrap();

        let (r1, r2) = tokio::join!(
            h.coordinator.acknowledge(&item.id, "b", &cut.token),
            h.coordinator.acknowledge(&item.id, "c", &cut.token),
        );
        let outcomes = vec![r1.unwrap(), r2.unwrap()];

        // One ack leaves the other device pending, the other deletes.
        assert!(outcomes.contains(&AckOutcome::Deleted));
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, AckOutcome::Pending(p) if p.len() == 1)));
        assert!(h.store.get(&item.id).await.is_none());
    }

    #[tokio::test]
    async fn test_explicit_delete_is_terminal_from_cut_state() {
        let h = harness();
        let _rx_a = connect(&h.registry, "a").await;
        let _rx_b = connect(&h.registry, "b").await;

        let item = h.store.add_text("x").await.unwrap();
        let cut = h
            .coordinator
            .create_cut(&item.id, "a", 300)
            .await
            .unwrap()
            .cut
            .unwrap();

        h.coordinator.delete_item(&item.id).await.unwrap();
        assert!(h.store.get(&item.id).await.is_none());

        // The sweep observing the vanished item stays a no-op.
        let expired = h
            .coordinator
            .expire_sweep(cut.deadline + Duration::seconds(1))
            .await
            .unwrap();
        assert!(expired.is_empty());
    }
}
