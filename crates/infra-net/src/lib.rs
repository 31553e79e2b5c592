// deferq Infrastructure - Network Adapters
// Implements: ConnectivityMonitor (TCP reachability probe), Delivery (HTTP replay)

pub mod http_delivery;
pub mod tcp_probe;

pub use http_delivery::HttpDelivery;
pub use tcp_probe::TcpProbeConnectivity;
