//! Building blocks of a model: variables, components and groups.

pub mod component;
pub mod group;
pub mod variable;

pub use component::{Component, ExecComp, IndepVarComp, Outputs, Params};
pub use group::{Connection, Group, Node, Promotion};
pub use variable::{Interface, Role, VarMeta};
