//! Core ledger module
//!
//! This module contains the ledger components and the machinery they share:
//! - `context` - Store, lock striping, clock and ID generator in one place
//! - `balance_mutator` - Primitive balance operations and account status
//! - `lock_manager` - Time-delayed balance locks
//! - `allocation_manager` - Purpose-bound allocations
//! - `transaction_finalizer` - Transaction state machine
//! - `batch_coordinator` - All-or-nothing transfer batches
//! - `engine` - Facade that routes commands to the components
//! - `clock`, `ids`, `hooks`, `lock_table` - Pluggable collaborators and locking

pub mod allocation_manager;
pub mod balance_mutator;
pub mod batch_coordinator;
pub mod clock;
pub mod context;
pub mod engine;
pub mod hooks;
pub mod ids;
pub mod lock_manager;
pub mod lock_table;
pub mod transaction_finalizer;

pub use allocation_manager::AllocationManager;
pub use balance_mutator::BalanceMutator;
pub use batch_coordinator::{BatchCoordinator, BatchReceipt};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{LedgerConfig, LedgerContext, WorkingSet};
pub use engine::LedgerEngine;
pub use hooks::{ConsensusHook, KeyCipher, NoopConsensus, PassthroughCipher, SyncEvent};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use lock_manager::LockManager;
pub use lock_table::{LockGuards, LockTable};
pub use transaction_finalizer::TransactionFinalizer;
