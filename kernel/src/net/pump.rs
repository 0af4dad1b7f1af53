//! Polling loops between the NIC and a packet dispatch service
//!
//! The driver never blocks, so the retry policy lives here: outbound frames
//! are retried while the transmit ring is full, giving the caller a chance to
//! yield between attempts, and inbound frames are drained until the receive
//! ring reports empty.

use crate::drivers::e1000::{E1000, RegisterWindow, RxError, TxError};
use alloc::vec::Vec;
use log::{trace, warn};

/// The consumer and producer of frames on the other side of the driver
pub trait PacketDispatch {
    /// Hand over one frame received from the wire
    fn submit_inbound(&mut self, frame: &[u8]);

    /// Next frame waiting to go out, if any
    fn request_outbound(&mut self) -> Option<Vec<u8>>;
}

/// Result of one outbound pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    /// Nothing was waiting
    Idle,
    /// A frame of this many bytes was queued
    Sent(usize),
    /// The frame can never be sent and was discarded
    Dropped(TxError),
}

/// Move one frame from `dispatch` onto the transmit ring
///
/// While the ring is full `yield_now` runs between attempts; it receives the
/// NIC so a caller can service the receive side meanwhile.
pub fn pump_outbound<R, D, Y>(nic: &mut E1000<R>, dispatch: &mut D, mut yield_now: Y) -> Outbound
where
    R: RegisterWindow,
    D: PacketDispatch + ?Sized,
    Y: FnMut(&mut E1000<R>),
{
    let Some(frame) = dispatch.request_outbound() else {
        return Outbound::Idle;
    };

    loop {
        match nic.transmit(&frame) {
            Ok(()) => return Outbound::Sent(frame.len()),
            Err(TxError::RingFull) => yield_now(nic),
            Err(e) => {
                warn!("NET: dropping outbound frame: {}", e);
                return Outbound::Dropped(e);
            }
        }
    }
}

/// Deliver every complete frame waiting in the receive ring
///
/// Frames are copied through `scratch`; one that does not fit is dropped.
/// Returns the number of frames submitted.
pub fn pump_inbound<R, D>(nic: &mut E1000<R>, dispatch: &mut D, scratch: &mut [u8]) -> usize
where
    R: RegisterWindow,
    D: PacketDispatch + ?Sized,
{
    let mut delivered = 0;

    // At most one ring's worth, so a busy link cannot pin the caller here
    for _ in 0..nic.rx_ring().len() {
        match nic.receive(scratch) {
            Ok(len) => {
                dispatch.submit_inbound(&scratch[..len]);
                delivered += 1;
            }
            Err(RxError::RingEmpty) => break,
            Err(RxError::Truncated { dropped, .. }) => {
                trace!("NET: discarded oversized frame ({} bytes over)", dropped);
            }
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::e1000::MAX_BUF_SIZE;
    use crate::drivers::e1000::testing::*;
    use alloc::collections::VecDeque;
    use alloc::vec;

    #[derive(Default)]
    struct Queue {
        inbound: Vec<Vec<u8>>,
        outbound: VecDeque<Vec<u8>>,
    }

    impl PacketDispatch for Queue {
        fn submit_inbound(&mut self, frame: &[u8]) {
            self.inbound.push(frame.to_vec());
        }

        fn request_outbound(&mut self) -> Option<Vec<u8>> {
            self.outbound.pop_front()
        }
    }

    #[test]
    fn outbound_idle_without_frames() {
        let mut nic = nic();
        let mut queue = Queue::default();
        let outcome = pump_outbound(&mut nic, &mut queue, |_| panic!("should not yield"));
        assert_eq!(outcome, Outbound::Idle);
        assert!(nic.registers().writes().is_empty());
    }

    #[test]
    fn outbound_sends_one_frame_per_call() {
        let mut nic = nic();
        let mut queue = Queue::default();
        queue.outbound.extend([frame(100, 1), frame(200, 2)]);

        assert_eq!(pump_outbound(&mut nic, &mut queue, |_| {}), Outbound::Sent(100));
        assert_eq!(queue.outbound.len(), 1);
        assert_eq!(pump_outbound(&mut nic, &mut queue, |_| {}), Outbound::Sent(200));
        assert_eq!(drain_tx(&mut nic), vec![frame(100, 1), frame(200, 2)]);
    }

    #[test]
    fn outbound_yields_until_ring_drains() {
        let mut nic = small_nic(8, 16);
        while nic.can_transmit(64) {
            nic.transmit(&frame(64, 0)).unwrap();
        }
        let queued = drain_tx(&mut nic).len();
        // rearm the done slots so the ring is full again
        while nic.can_transmit(64) {
            nic.transmit(&frame(64, 0)).unwrap();
        }

        let mut queue = Queue::default();
        queue.outbound.push_back(frame(64, 9));
        let mut yields = 0;
        let outcome = pump_outbound(&mut nic, &mut queue, |nic| {
            yields += 1;
            if yields == 3 {
                drain_tx(nic);
            }
        });

        assert_eq!(outcome, Outbound::Sent(64));
        assert_eq!(yields, 3);
        assert_eq!(queued, 7);
        assert_eq!(drain_tx(&mut nic), vec![frame(64, 9)]);
    }

    #[test]
    fn outbound_drops_oversized_frame() {
        let mut nic = small_nic(8, 16);
        let mut queue = Queue::default();
        queue.outbound.push_back(vec![0; 20_000]);

        let outcome = pump_outbound(&mut nic, &mut queue, |_| panic!("should not yield"));
        assert!(matches!(outcome, Outbound::Dropped(TxError::FrameTooLarge { len: 20_000, .. })));
        assert!(queue.outbound.is_empty());
    }

    #[test]
    fn inbound_drains_in_order() {
        let mut nic = nic();
        let frames = [frame(60, 1), frame(1500, 2), frame(3000, 3)];
        for f in &frames {
            assert!(deliver_rx(&mut nic, f));
        }

        let mut queue = Queue::default();
        let mut scratch = vec![0u8; 4096];
        assert_eq!(pump_inbound(&mut nic, &mut queue, &mut scratch), 3);
        assert_eq!(queue.inbound, frames);
        assert_eq!(pump_inbound(&mut nic, &mut queue, &mut scratch), 0);
    }

    #[test]
    fn inbound_skips_frames_that_do_not_fit() {
        let mut nic = nic();
        assert!(deliver_rx(&mut nic, &frame(3000, 1)));
        assert!(deliver_rx(&mut nic, &frame(80, 2)));

        let mut queue = Queue::default();
        let mut scratch = vec![0u8; MAX_BUF_SIZE];
        assert_eq!(pump_inbound(&mut nic, &mut queue, &mut scratch), 1);
        assert_eq!(queue.inbound, vec![frame(80, 2)]);
        assert_eq!(nic.stats().rx_truncated, 1);
    }
}
