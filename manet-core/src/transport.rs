use crate::Simulator;
use std::net::SocketAddrV4;

/// A UDP style endpoint: node address and port.
pub type Endpoint = SocketAddrV4;

/// The send side of the transport collaborator.
///
/// Implemented by the simulated world. Sending is fire and forget: there
/// is no acknowledgement and loss is reported, in aggregate, through the
/// [`TraceBus`] only.
///
/// [`TraceBus`]: crate::bus::TraceBus
pub trait Transport: Sized + 'static {
    /// Hand a datagram of `payload_size` bytes over to the transport.
    fn send(
        &mut self,
        sim: &mut Simulator<Self>,
        source: Endpoint,
        destination: Endpoint,
        payload_size: u64,
    );

    /// Release the socket bound to `local`. Nothing is sent from it after.
    fn close(&mut self, _sim: &mut Simulator<Self>, _local: Endpoint) {}
}
