/// Parameter vector codec and EC-side policy representation (C1).
pub mod params;

/// `burn` actor/critic modules bridged to/from [`params::PolicyParams`].
pub mod mlp;

/// [`crate::collector::ActorPolicy`] bridges for both representations.
pub mod policy;

pub use mlp::Mlp;
pub use params::{LayerParams, PolicyParams};
pub use policy::{NetPolicy, ParamsPolicy};
