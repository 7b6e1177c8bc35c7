pub mod attribution;
pub mod balance;
pub mod collector;
pub mod mode;
pub mod reconcile;
pub mod sankey;
