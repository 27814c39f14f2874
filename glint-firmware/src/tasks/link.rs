//! App link tasks
//!
//! Byte transport to the companion app bridge. Packets are a length
//! byte followed by one complete encoded message; the UARTE reads
//! exact lengths via EasyDMA, so no streaming parser is needed.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::uarte::{UarteRx, UarteTx};

use glint_protocol::{HostMessage, MAX_MESSAGE_SIZE};

use crate::channels::{INBOUND, LINK_RESET, OUTBOUND};

/// Link RX task - reads packets from the app and feeds decoded
/// messages to the settings task
#[embassy_executor::task]
pub async fn link_rx_task(mut rx: UarteRx<'static, UARTE0>) {
    info!("Link RX task started");

    let mut packet = [0u8; MAX_MESSAGE_SIZE];
    loop {
        let mut len_byte = [0u8; 1];
        if let Err(e) = rx.read(&mut len_byte).await {
            warn!("Link read error: {:?}", e);
            continue;
        }
        let len = len_byte[0] as usize;
        if len == 0 || len > MAX_MESSAGE_SIZE {
            warn!("Bad packet length {=usize}, resynchronizing", len);
            continue;
        }
        if let Err(e) = rx.read(&mut packet[..len]).await {
            warn!("Link read error: {:?}", e);
            continue;
        }

        match HostMessage::decode(&packet[..len]) {
            Ok(msg) => {
                trace!("RX message: {:?}", msg);
                INBOUND.send(msg).await;
            }
            Err(e) => warn!("Message decode error: {:?}", e),
        }
    }
}

/// Link TX task - frames outgoing messages; a link reset drops
/// anything still queued
#[embassy_executor::task]
pub async fn link_tx_task(mut tx: UarteTx<'static, UARTE0>) {
    info!("Link TX task started");

    loop {
        match select(OUTBOUND.receive(), LINK_RESET.wait()).await {
            Either::First(msg) => {
                let packet = msg.encode();
                let mut framed = [0u8; 1 + MAX_MESSAGE_SIZE];
                framed[0] = packet.len() as u8;
                framed[1..1 + packet.len()].copy_from_slice(&packet);
                if let Err(e) = tx.write(&framed[..1 + packet.len()]).await {
                    warn!("Link write error: {:?}", e);
                }
            }
            Either::Second(()) => {
                info!("Link reset, dropping queued messages");
                while OUTBOUND.try_receive().is_ok() {}
            }
        }
    }
}
