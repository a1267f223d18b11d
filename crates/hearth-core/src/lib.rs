pub mod intent;
pub mod ledger;
pub mod model;

pub use intent::{Intent, IntentKind, parse_amount, parse_date, parse_time};
pub use ledger::{
    Change, Ledger, LedgerError, Mutation, MutationKind, Payer, Reconcile, Snapshot, new_tx_id,
    reduce, split_share,
};
pub use model::{
    Account, Friend, MONEY_EPSILON, Record, RecordKey, Reminder, Table, Transaction,
    TransactionKind, format_amount,
};
