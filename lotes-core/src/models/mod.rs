mod branch;
mod location;
mod lot;
mod stage;

pub use branch::Branch;
pub use location::Location;
pub use lot::{LotRecord, Variety, MAX_VARIETIES};
pub use stage::Stage;
