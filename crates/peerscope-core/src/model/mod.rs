pub mod bgp;
pub mod output;
pub mod traceroute;

pub use bgp::{BgpRoute, BgpRouteTable, RpkiState, WinningWeight};
pub use output::{OutputData, OutputFormat, QueryOutput};
pub use traceroute::{AsnOrganization, TracerouteHop, TracerouteResult};
