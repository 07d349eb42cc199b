pub mod gate;
mod store;
mod tool;

pub use gate::{EffectivePomGate, GateSettings, Ticket, CAPACITY_KEY};
pub use store::{CapacityStore, MemoryCapacityStore, RedisCapacityStore};
pub use tool::{EffectivePomTool, MavenEffectivePom, ToolLimits};
