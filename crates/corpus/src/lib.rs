//! Concurrent member corpus with per-member exclusive sampling.
//!
//! The corpus is the in-memory mirror of members maintained by the workload
//! generator. It supports two operations under arbitrary concurrency:
//!
//! - [`Corpus::add`] - append members, never removing or reordering
//! - [`Corpus::sample`] - pick a uniformly random member and take its
//!   exclusive lock without blocking on any other member
//!
//! Each member is combined with its lock in a single ownership unit
//! (`Arc<Mutex<Member>>`), so growth of the backing vector can never
//! relocate a slot out from under a holder, and the member/lock pairing
//! cannot drift out of sync. The structural lock protects only append and
//! length reads, is held for O(1) time, and is never held across a
//! per-member lock acquisition, which rules out lock-order inversion.
//!
//! Sampling try-locks one random slot at a time, so a sampler never holds
//! more than one lock and cannot deadlock against other samplers. Retries
//! are bounded: under adversarial contention [`CorpusError::Busy`] is
//! surfaced instead of spinning forever.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use feed_core::Member;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Upper bound on random try-lock attempts per [`Corpus::sample`] call.
///
/// With uniform index selection the chance of exhausting this many attempts
/// while any slot is free is negligible; hitting the bound means the corpus
/// is effectively fully locked.
const MAX_SAMPLE_ATTEMPTS: usize = 1024;

/// Errors from corpus sampling.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CorpusError {
    /// The corpus held no members at the time of the length read.
    #[error("corpus is empty")]
    Empty,

    /// No member lock could be acquired within the retry bound.
    #[error("no member lock acquired after {0} attempts")]
    Busy(usize),
}

/// An exclusively locked member obtained from [`Corpus::sample`].
///
/// Dereferences to the member for inspection and mutation. The lock is
/// released when the guard is dropped — exactly once, by construction.
pub struct SampledMember {
    guard: OwnedMutexGuard<Member>,
}

impl Deref for SampledMember {
    type Target = Member;

    fn deref(&self) -> &Member {
        &self.guard
    }
}

impl DerefMut for SampledMember {
    fn deref_mut(&mut self) -> &mut Member {
        &mut self.guard
    }
}

impl fmt::Debug for SampledMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SampledMember").field(&*self.guard).finish()
    }
}

/// Append-only collection of members paired with per-member locks.
#[derive(Default)]
pub struct Corpus {
    slots: RwLock<Vec<Arc<Mutex<Member>>>>,
}

impl Corpus {
    /// Create an empty corpus.
    pub fn new() -> Self {
        Corpus {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Append members, each as a fresh unlocked slot.
    ///
    /// Indices handed out before this call remain valid; in-flight sample
    /// guards are unaffected.
    pub async fn add(&self, members: impl IntoIterator<Item = Member>) {
        let mut slots = self.slots.write().await;
        for member in members {
            slots.push(Arc::new(Mutex::new(member)));
        }
    }

    /// Number of members currently registered.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sample a uniformly random member and take its exclusive lock.
    ///
    /// Reads the length once, then repeatedly picks a random index in
    /// `[0, len)` and try-locks that slot. A failed attempt moves on to a
    /// new random index; no attempt ever blocks and no more than one lock
    /// is held at a time. Concurrent [`Corpus::add`] calls may grow the
    /// corpus past `len` mid-sample; those new slots are simply not
    /// candidates for this call.
    ///
    /// # Errors
    ///
    /// [`CorpusError::Empty`] when the corpus held no members at the length
    /// read; [`CorpusError::Busy`] when every attempt found its slot locked.
    pub async fn sample(&self) -> Result<SampledMember, CorpusError> {
        let len = self.slots.read().await.len();
        if len == 0 {
            return Err(CorpusError::Empty);
        }

        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let idx = rand::rng().random_range(0..len);
            // Clone the slot handle under the structural lock, then release
            // it before the try-lock so the two locks are never nested.
            let slot = {
                let slots = self.slots.read().await;
                Arc::clone(&slots[idx])
            };
            if let Ok(guard) = slot.try_lock_owned() {
                return Ok(SampledMember { guard });
            }
        }

        Err(CorpusError::Busy(MAX_SAMPLE_ATTEMPTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    fn member(id: i64) -> Member {
        Member {
            id,
            name: format!("member-{id}"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_corpus_yields_empty_error() {
        let corpus = Corpus::new();
        assert_eq!(corpus.sample().await.unwrap_err(), CorpusError::Empty);
    }

    #[tokio::test]
    async fn length_tracks_adds() {
        let corpus = Corpus::new();
        assert!(corpus.is_empty().await);

        corpus.add([member(1), member(2)]).await;
        corpus.add([member(3)]).await;
        assert_eq!(corpus.len().await, 3);
    }

    #[tokio::test]
    async fn every_member_is_sampleable() {
        let corpus = Corpus::new();
        corpus.add((1..=5).map(member)).await;

        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let sampled = corpus.sample().await.unwrap();
            seen.insert(sampled.id);
            if seen.len() == 5 {
                break;
            }
        }
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn sampling_all_slots_reports_busy() {
        let corpus = Corpus::new();
        corpus.add([member(1), member(2)]).await;

        let _a = corpus.sample().await.unwrap();
        let _b = corpus.sample().await.unwrap();
        assert_ne!(_a.id, _b.id);

        assert!(matches!(
            corpus.sample().await.unwrap_err(),
            CorpusError::Busy(_)
        ));
    }

    #[tokio::test]
    async fn dropping_guard_releases_slot() {
        let corpus = Corpus::new();
        corpus.add([member(1)]).await;

        let first = corpus.sample().await.unwrap();
        assert!(matches!(
            corpus.sample().await.unwrap_err(),
            CorpusError::Busy(_)
        ));

        drop(first);
        let again = corpus.sample().await.unwrap();
        assert_eq!(again.id, 1);
    }

    #[tokio::test]
    async fn mutation_through_guard_sticks() {
        let corpus = Corpus::new();
        corpus.add([member(7)]).await;

        {
            let mut sampled = corpus.sample().await.unwrap();
            sampled.name = "renamed".to_string();
        }

        let sampled = corpus.sample().await.unwrap();
        assert_eq!(sampled.name, "renamed");
    }

    #[tokio::test]
    async fn concurrent_adds_do_not_disturb_held_guards() {
        let corpus = Arc::new(Corpus::new());
        corpus.add([member(1)]).await;

        let held = corpus.sample().await.unwrap();
        let id_before = held.id;

        // Force the backing vector to reallocate while the guard is held.
        corpus.add((2..=1000).map(member)).await;
        assert_eq!(corpus.len().await, 1000);
        assert_eq!(held.id, id_before);
        drop(held);

        let again = corpus.sample().await.unwrap();
        assert!((1..=1000).contains(&again.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_add_and_sample() {
        let corpus = Arc::new(Corpus::new());
        corpus.add((0..10).map(member)).await;

        let mut tasks = Vec::new();
        for t in 0..4 {
            let corpus = Arc::clone(&corpus);
            tasks.push(tokio::spawn(async move {
                for i in 0..100 {
                    corpus.add([member(1000 + t * 100 + i)]).await;
                    match corpus.sample().await {
                        Ok(sampled) => {
                            // Hold briefly to create contention.
                            tokio::task::yield_now().await;
                            drop(sampled);
                        }
                        Err(CorpusError::Busy(_)) => {}
                        Err(CorpusError::Empty) => panic!("corpus was seeded"),
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(corpus.len().await, 10 + 4 * 100);
    }
}
