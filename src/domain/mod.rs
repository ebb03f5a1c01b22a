mod credit;
mod ledger;
mod loan;
mod money;
mod notify;
mod policy;
mod treasury;

pub use credit::*;
pub use ledger::*;
pub use loan::*;
pub use money::*;
pub use notify::*;
pub use policy::*;
pub use treasury::*;
