// Static map assets: control nodes and recorded route headings

pub mod control_nodes;
pub mod yaw_table;

pub use control_nodes::*;
pub use yaw_table::*;
