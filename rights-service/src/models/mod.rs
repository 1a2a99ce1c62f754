pub mod access;
pub mod capability;
pub mod org_node;
pub mod profile;
pub mod rights;
pub mod role;
pub mod user;

pub use access::{Access, AccessWindow, CreateAccessRequest, ResolvedAccess};
pub use capability::{Capability, CapabilityFamily, CapabilitySet, GrantAxis, ManagementScope};
pub use org_node::OrgNode;
pub use profile::{Profile, ProfileSource};
pub use rights::{
    AggregatedRights, AggregationMode, DataRights, ReadStrength, ReadableNode, RightFlags,
};
pub use role::{Role, RoleRequirements, RoleRow};
pub use user::User;
