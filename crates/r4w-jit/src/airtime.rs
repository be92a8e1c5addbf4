//! # Time-on-Air
//!
//! The queue reserves `time_on_air` microseconds after the TX timestamp of
//! every downlink. It gets that figure through the [`Airtime`] trait, so any
//! payload type can be queued as long as it can say how long it will occupy
//! the radio.
//!
//! [`TxPacket`] is the concentrator TX descriptor and implements the usual
//! modem formulas:
//!
//! ```text
//! LoRa:  Tsym     = 2^SF / BW           (BW in whole kHz, 62.5 -> 62)
//!        Tpre     = (8 + 4.25) * Tsym
//!        Npayload = 8 + max(ceil((8*PL - 4*SF + 28 + 16 - 20*H) / (4*(SF - 2*DE))) * (CR + 4), 0)
//!        ToA      = Tpre + Npayload * Tsym
//!
//! FSK:   ToA      = 8 * (preamble + sync + len + PL + crc) / bitrate  (+1 ms)
//! ```
//!
//! Both are truncated to whole milliseconds, the resolution the packet
//! forwarder has always used for its reservations. The LoRa estimate always
//! assumes the 8 symbol preamble the radio is programmed with, whatever the
//! packet's `preamble` field says.
//!
//! ## Example
//!
//! ```rust
//! use r4w_jit::airtime::{Airtime, Bandwidth, CodeRate, TxPacket};
//!
//! let pkt = TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0u8; 20]);
//! assert_eq!(pkt.time_on_air_us(), Some(56_000));
//! ```

use serde::{Deserialize, Serialize};

use crate::timing::CountUs;
use crate::types::{Dequeued, Frame, FrameClass};

/// LoRa preamble length in symbols assumed for time on air.
pub const LORA_PREAMBLE_SYMBOLS: u16 = 8;

/// Default FSK preamble length in bytes.
pub const FSK_PREAMBLE_BYTES: u16 = 5;

/// FSK sync word length in bytes.
pub const FSK_SYNC_WORD_BYTES: u16 = 3;

/// Estimates how long a frame keeps the radio busy.
pub trait Airtime {
    /// Time on air in microseconds, or `None` if the frame cannot be timed
    /// (unsupported modulation parameters).
    fn time_on_air_us(&self) -> Option<u32>;
}

impl<T: Airtime + ?Sized> Airtime for Box<T> {
    fn time_on_air_us(&self) -> Option<u32> {
        (**self).time_on_air_us()
    }
}

/// LoRa modulation bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bandwidth {
    Khz500,
    Khz250,
    Khz125,
    Khz62_5,
    Khz31_2,
    Khz15_6,
    Khz7_8,
}

impl Bandwidth {
    pub const fn hz(&self) -> u32 {
        match self {
            Bandwidth::Khz500 => 500_000,
            Bandwidth::Khz250 => 250_000,
            Bandwidth::Khz125 => 125_000,
            Bandwidth::Khz62_5 => 62_500,
            Bandwidth::Khz31_2 => 31_200,
            Bandwidth::Khz15_6 => 15_600,
            Bandwidth::Khz7_8 => 7_800,
        }
    }

    /// Bandwidth truncated to whole kHz.
    pub const fn khz(&self) -> u32 {
        self.hz() / 1_000
    }
}

/// LoRa forward error correction rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeRate {
    Cr4_5,
    Cr4_6,
    Cr4_7,
    Cr4_8,
}

impl CodeRate {
    /// `CR` in the `4/(4+CR)` notation.
    pub const fn index(&self) -> u8 {
        match self {
            CodeRate::Cr4_5 => 1,
            CodeRate::Cr4_6 => 2,
            CodeRate::Cr4_7 => 3,
            CodeRate::Cr4_8 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Modulation {
    Lora {
        /// Spreading factor, 7 to 12.
        sf: u8,
        bw: Bandwidth,
        cr: CodeRate,
    },
    Fsk {
        /// Bit rate in bits per second.
        datarate: u32,
        /// Frequency deviation in kHz.
        f_dev: u8,
    },
}

/// When the concentrator fires the TX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TxMode {
    /// As soon as possible.
    Immediate,
    /// At `count_us` on the concentrator counter.
    #[default]
    Timestamped,
    /// On the next GPS PPS.
    OnGps,
}

/// Concentrator TX descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxPacket {
    /// Center frequency of TX
    pub freq_hz: u32,
    pub tx_mode: TxMode,
    /// Timestamp or delay in microseconds for TX trigger
    pub count_us: CountUs,
    pub rf_chain: u8,
    /// TX power in dBm
    pub rf_power: i8,
    pub modulation: Modulation,
    /// Invert signal polarity, for orthogonal downlinks (LoRa only)
    pub invert_pol: bool,
    /// Preamble length, 0 for default. Only the FSK estimate reads it.
    pub preamble: u16,
    pub no_crc: bool,
    /// Implicit header (LoRa) or fixed length (FSK)
    pub no_header: bool,
    pub payload: Vec<u8>,
}

impl TxPacket {
    /// A timestamped LoRa packet with default radio settings.
    pub fn lora(sf: u8, bw: Bandwidth, cr: CodeRate, payload: Vec<u8>) -> Self {
        Self {
            freq_hz: 869_525_000,
            tx_mode: TxMode::Timestamped,
            count_us: 0,
            rf_chain: 0,
            rf_power: 14,
            modulation: Modulation::Lora { sf, bw, cr },
            invert_pol: true,
            preamble: 0,
            no_crc: true,
            no_header: false,
            payload,
        }
    }

    /// A timestamped FSK packet with default radio settings.
    pub fn fsk(datarate: u32, f_dev: u8, payload: Vec<u8>) -> Self {
        Self {
            modulation: Modulation::Fsk { datarate, f_dev },
            invert_pol: false,
            no_crc: false,
            ..Self::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, payload)
        }
    }

    pub fn with_count_us(mut self, count_us: CountUs) -> Self {
        self.count_us = count_us;
        self
    }

    pub fn with_tx_mode(mut self, tx_mode: TxMode) -> Self {
        self.tx_mode = tx_mode;
        self
    }

    pub fn with_freq_hz(mut self, freq_hz: u32) -> Self {
        self.freq_hz = freq_hz;
        self
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Wrap this packet into a queue frame.
    ///
    /// An `Immediate` packet always becomes a class C downlink, whatever
    /// `class` says; otherwise the packet's `count_us` is the requested time.
    pub fn into_frame(self, class: FrameClass) -> Frame<TxPacket> {
        let class = if self.tx_mode == TxMode::Immediate && class.is_downlink() {
            FrameClass::DownlinkC
        } else {
            class
        };
        Frame::new(class, self.count_us, self)
    }

    fn lora_time_on_air_ms(&self, sf: u8, bw: Bandwidth, cr: CodeRate) -> Option<u32> {
        if !(7..=12).contains(&sf) {
            return None;
        }

        let sf_f = sf as f64;
        let bw_khz = bw.khz() as f64;
        let h = if self.no_header { 1.0 } else { 0.0 };
        // low datarate optimisation
        let de = if sf >= 11 { 1.0 } else { 0.0 };
        let n_preamble = LORA_PREAMBLE_SYMBOLS as f64;

        let t_sym = 2f64.powf(sf_f) / bw_khz;
        let t_preamble = (n_preamble + 4.25) * t_sym;

        let numerator = 8.0 * self.size() as f64 - 4.0 * sf_f + 28.0 + 16.0 - 20.0 * h;
        let denom = 4.0 * (sf_f - 2.0 * de);
        let n_payload = 8.0 + ((numerator / denom).ceil() * (cr.index() as f64 + 4.0)).max(0.0);

        Some((t_preamble + n_payload * t_sym) as u32)
    }

    fn fsk_time_on_air_ms(&self, datarate: u32) -> Option<u32> {
        if datarate == 0 {
            return None;
        }

        let preamble = if self.preamble == 0 {
            FSK_PREAMBLE_BYTES
        } else {
            self.preamble
        };
        let crc = if self.no_crc { 0 } else { 2 };
        let bytes = preamble as usize + FSK_SYNC_WORD_BYTES as usize + 1 + self.size() + crc;

        let t_fsk = 8.0 * bytes as f64 / datarate as f64 * 1e3;
        // rounding margin
        Some(t_fsk as u32 + 1)
    }
}

impl Airtime for TxPacket {
    fn time_on_air_us(&self) -> Option<u32> {
        let ms = match self.modulation {
            Modulation::Lora { sf, bw, cr } => self.lora_time_on_air_ms(sf, bw, cr),
            Modulation::Fsk { datarate, .. } => self.fsk_time_on_air_ms(datarate),
        }?;
        ms.checked_mul(1_000)
    }
}

impl Dequeued<TxPacket> {
    /// The packet to hand to the concentrator: always timestamped, at the
    /// time the queue settled on.
    pub fn into_timestamped(self) -> TxPacket {
        TxPacket {
            tx_mode: TxMode::Timestamped,
            count_us: self.count_us,
            ..self.payload
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lora_sf7_toa() {
        let pkt = TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 20]);
        // 12.25 + 43 symbols of 1.024 ms
        assert_eq!(pkt.time_on_air_us(), Some(56_000));
    }

    #[test]
    fn test_lora_sf12_low_datarate_optimize() {
        let pkt = TxPacket::lora(12, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 10]);
        // 12.25 + 18 symbols of 32.768 ms
        assert_eq!(pkt.time_on_air_us(), Some(991_000));
    }

    #[test]
    fn test_lora_toa_ignores_preamble_field() {
        let mut pkt = TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 20]);
        pkt.preamble = 16;
        assert_eq!(pkt.time_on_air_us(), Some(56_000));
    }

    #[test]
    fn test_lora_toa_whole_khz_bandwidth() {
        assert_eq!(Bandwidth::Khz62_5.khz(), 62);
        let pkt = TxPacket::lora(7, Bandwidth::Khz62_5, CodeRate::Cr4_5, vec![0; 20]);
        // 55.25 symbols of 128 / 62 ms
        assert_eq!(pkt.time_on_air_us(), Some(114_000));
    }

    #[test]
    fn test_lora_toa_grows_with_payload() {
        let short = TxPacket::lora(9, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 5]);
        let long = TxPacket::lora(9, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 200]);
        assert!(long.time_on_air_us().unwrap() > short.time_on_air_us().unwrap());

        let wide = TxPacket::lora(9, Bandwidth::Khz500, CodeRate::Cr4_5, vec![0; 200]);
        assert!(wide.time_on_air_us().unwrap() < long.time_on_air_us().unwrap());
    }

    #[test]
    fn test_lora_invalid_sf() {
        let pkt = TxPacket::lora(6, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 10]);
        assert_eq!(pkt.time_on_air_us(), None);
        let pkt = TxPacket::lora(13, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 10]);
        assert_eq!(pkt.time_on_air_us(), None);
    }

    #[test]
    fn test_fsk_toa() {
        let pkt = TxPacket::fsk(50_000, 25, vec![0; 10]);
        // 21 bytes at 50 kbps = 3.36 ms, truncated, +1 ms
        assert_eq!(pkt.time_on_air_us(), Some(4_000));

        let bad = TxPacket::fsk(0, 25, vec![0; 10]);
        assert_eq!(bad.time_on_air_us(), None);
    }

    #[test]
    fn test_into_frame() {
        let pkt = TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![1, 2, 3])
            .with_count_us(5_000_000);
        let frame = pkt.clone().into_frame(FrameClass::DownlinkA);
        assert_eq!(frame.class, FrameClass::DownlinkA);
        assert_eq!(frame.count_us, 5_000_000);

        let frame = pkt
            .with_tx_mode(TxMode::Immediate)
            .into_frame(FrameClass::DownlinkA);
        assert_eq!(frame.class, FrameClass::DownlinkC);
    }

    #[test]
    fn test_into_timestamped() {
        let pkt = TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![9])
            .with_tx_mode(TxMode::Immediate);
        let out = Dequeued {
            class: FrameClass::DownlinkC,
            count_us: 1_234_567,
            payload: pkt,
        }
        .into_timestamped();
        assert_eq!(out.tx_mode, TxMode::Timestamped);
        assert_eq!(out.count_us, 1_234_567);
        assert_eq!(out.payload, vec![9]);
    }
}
