//! Batch processing with account-based partitioning
//!
//! The `BatchProcessor` runs a batch of commands concurrently while producing
//! the same ledger state as applying them one by one in file order.
//!
//! # Partitioning
//!
//! A batch is cut into [`Segment`]s at every barrier command (see
//! [`LedgerCommand::is_barrier`]). Barriers run alone. Between two barriers,
//! commands are grouped into connected components over the accounts they
//! name: two commands land in the same group when they share an account,
//! directly or through a chain of other commands.
//!
//! ```text
//! deposit A | transfer A→B | deposit C | lock A→C | deposit B
//! └──── group {A,B} ─────┘   {C}        barrier     {B}
//! ```
//!
//! Groups touch disjoint accounts, so they commute; each group keeps file
//! order internally and runs on a blocking worker. At most
//! `max_concurrent` groups run at once.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::warn;

use crate::core::LedgerEngine;
use crate::types::{LedgerCommand, LedgerError};

/// Result of processing a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub command: LedgerCommand,
    pub result: Result<(), LedgerError>,
}

/// A run of commands with a single scheduling rule
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Runs alone, after everything before it and before everything after it
    Barrier(LedgerCommand),
    /// Independent groups; each group is in file order
    Parallel(Vec<Vec<LedgerCommand>>),
}

#[derive(Clone)]
pub struct BatchProcessor {
    engine: LedgerEngine,
    max_concurrent: usize,
}

impl BatchProcessor {
    pub fn new(engine: LedgerEngine, max_concurrent: usize) -> Self {
        Self {
            engine,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Split a batch into barrier and parallel segments, in file order
    pub fn partition(batch: Vec<LedgerCommand>) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut run = Vec::new();

        for command in batch {
            if command.is_barrier() {
                if !run.is_empty() {
                    segments.push(Segment::Parallel(Self::group_by_accounts(
                        std::mem::take(&mut run),
                    )));
                }
                segments.push(Segment::Barrier(command));
            } else {
                run.push(command);
            }
        }
        if !run.is_empty() {
            segments.push(Segment::Parallel(Self::group_by_accounts(run)));
        }

        segments
    }

    /// Connected components of commands over shared accounts
    ///
    /// Groups are ordered by their first command; commands keep file order
    /// within a group.
    pub fn group_by_accounts(commands: Vec<LedgerCommand>) -> Vec<Vec<LedgerCommand>> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut parent: Vec<usize> = Vec::new();

        for command in &commands {
            let mut first = None;
            for account in command.accounts() {
                let slot = *slots.entry(account.to_string()).or_insert_with(|| {
                    parent.push(parent.len());
                    parent.len() - 1
                });
                match first {
                    None => first = Some(slot),
                    Some(root) => union(&mut parent, root, slot),
                }
            }
        }

        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<LedgerCommand>> = Vec::new();
        for command in commands {
            let root = command
                .accounts()
                .first()
                .and_then(|account| slots.get(*account).copied())
                .map(|slot| find(&mut parent, slot));

            let index = match root {
                Some(root) => *group_of_root.entry(root).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                }),
                None => {
                    groups.push(Vec::new());
                    groups.len() - 1
                }
            };
            groups[index].push(command);
        }

        groups
    }

    /// Process a batch, returning one result per command
    ///
    /// Results of a parallel segment arrive in completion order.
    pub async fn process_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());

        for segment in Self::partition(batch) {
            match segment {
                Segment::Barrier(command) => {
                    results.extend(self.run_group(vec![command]).await);
                }
                Segment::Parallel(groups) => {
                    let outcomes: Vec<Vec<ProcessingResult>> = stream::iter(groups)
                        .map(|group| self.run_group(group))
                        .buffer_unordered(self.max_concurrent)
                        .collect()
                        .await;
                    results.extend(outcomes.into_iter().flatten());
                }
            }
        }

        results
    }

    async fn run_group(&self, group: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let engine = self.engine.clone();
        let commands = group.clone();
        let task = tokio::task::spawn_blocking(move || Self::apply_group(&engine, group));

        match task.await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, commands = commands.len(), "worker task failed");
                Self::fail_group(commands, &e.to_string())
            }
        }
    }

    fn apply_group(engine: &LedgerEngine, group: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        group
            .into_iter()
            .map(|command| {
                let result = engine.process(&command);
                ProcessingResult { command, result }
            })
            .collect()
    }

    /// One error per command of a group whose worker died
    ///
    /// The worker may have applied a prefix of the group before stopping.
    fn fail_group(commands: Vec<LedgerCommand>, message: &str) -> Vec<ProcessingResult> {
        commands
            .into_iter()
            .map(|command| ProcessingResult {
                command,
                result: Err(LedgerError::WorkerFailed {
                    message: message.to_string(),
                }),
            })
            .collect()
    }
}

fn find(parent: &mut [usize], mut slot: usize) -> usize {
    while parent[slot] != slot {
        parent[slot] = parent[parent[slot]];
        slot = parent[slot];
    }
    slot
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let root_a = find(parent, a);
    let root_b = find(parent, b);
    if root_a != root_b {
        parent[root_b] = root_a;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn deposit(account: &str) -> LedgerCommand {
        LedgerCommand::Deposit {
            account: account.into(),
            amount: Decimal::ONE,
        }
    }

    fn transfer(from: &str, to: &str) -> LedgerCommand {
        LedgerCommand::Transfer {
            from: from.into(),
            to: to.into(),
            amount: Decimal::ONE,
        }
    }

    #[test]
    fn test_group_by_accounts_joins_chains() {
        let groups = BatchProcessor::group_by_accounts(vec![
            deposit("A"),
            deposit("C"),
            transfer("B", "D"),
            transfer("A", "B"),
            deposit("E"),
        ]);

        assert_eq!(
            groups,
            vec![
                vec![deposit("A"), transfer("B", "D"), transfer("A", "B")],
                vec![deposit("C")],
                vec![deposit("E")],
            ]
        );
    }

    #[test]
    fn test_partition_cuts_at_barriers() {
        let advance = LedgerCommand::Advance { seconds: 60 };
        let segments = BatchProcessor::partition(vec![
            deposit("A"),
            deposit("B"),
            advance.clone(),
            advance.clone(),
            deposit("A"),
        ]);

        assert_eq!(
            segments,
            vec![
                Segment::Parallel(vec![vec![deposit("A")], vec![deposit("B")]]),
                Segment::Barrier(advance.clone()),
                Segment::Barrier(advance),
                Segment::Parallel(vec![vec![deposit("A")]]),
            ]
        );
    }

    #[test]
    fn test_partition_empty_batch() {
        assert!(BatchProcessor::partition(Vec::new()).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_process_batch_matches_sequential_order() {
        let engine = LedgerEngine::in_memory();
        let processor = BatchProcessor::new(engine.clone(), 4);

        let mut batch = vec![
            LedgerCommand::Create { account: "A".into() },
            LedgerCommand::Create { account: "B".into() },
            LedgerCommand::Create { account: "C".into() },
        ];
        for _ in 0..50 {
            batch.push(deposit("A"));
            batch.push(deposit("C"));
            batch.push(transfer("A", "B"));
        }

        let results = processor.process_batch(batch).await;

        assert_eq!(results.len(), 153);
        assert!(results.iter().all(|r| r.result.is_ok()));
        assert_eq!(engine.account("A").unwrap().balance, Decimal::ZERO);
        assert_eq!(engine.account("B").unwrap().balance, Decimal::new(50, 0));
        assert_eq!(engine.account("C").unwrap().balance, Decimal::new(50, 0));
    }

    #[test]
    fn test_failed_worker_reports_every_command() {
        let results =
            BatchProcessor::fail_group(vec![deposit("A"), transfer("A", "B")], "task panicked");

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].command, transfer("A", "B"));
        assert!(results.iter().all(|r| matches!(
            &r.result,
            Err(LedgerError::WorkerFailed { message }) if message == "task panicked"
        )));
    }

    #[tokio::test]
    async fn test_process_batch_reports_failures() {
        let engine = LedgerEngine::in_memory();
        let processor = BatchProcessor::new(engine, 2);

        let results = processor
            .process_batch(vec![deposit("GHOST"), LedgerCommand::Finalize { tx: "tx-9".into() }])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.result.is_err()));
    }
}
