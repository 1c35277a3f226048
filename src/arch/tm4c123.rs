//! # TM4C123GH6PM board support
//!
//! Register-level drivers for the feeder capabilities:
//!
//! | Capability | Peripheral | Notes |
//! |------------|------------|-------|
//! | [`WordStore`] | EEPROM | 32-bit words, 16 words per block |
//! | [`RtcRegisters`] | Hibernation RTC | 1 Hz counter, match register 0 |
//! | [`Actuator`] | PWM0 generator 0, output B | PB7, M0PWM1 |
//! | [`OneShotTimer`] | WTIMER2 | 64-bit concatenated one-shot |
//! | console | UART0 | PA0/PA1, 115200 8N1 |
//!
//! All register access goes through the `tm4c123x` PAC using raw bit
//! values.

use core::fmt;

use cortex_m::peripheral::NVIC;
use tm4c123x::Interrupt;

use crate::clock::RtcRegisters;
use crate::config::{
    CONSOLE_BAUD, MAX_INTENSITY, PWM_PERIOD, STORE_WORDS, SYSTEM_CLOCK_HZ, WORDS_PER_BLOCK,
};
use crate::dispatch::{Actuator, OneShotTimer};
use crate::store::WordStore;

// ---------------------------------------------------------------------------
// System clock
// ---------------------------------------------------------------------------

/// RCC.XTAL = 16 MHz crystal.
const RCC_XTAL_16MHZ: u32 = 0x15 << 6;
const RCC_BYPASS: u32 = 1 << 11;
const RCC_PWRDN: u32 = 1 << 13;
const RCC_USESYSDIV: u32 = 1 << 22;
/// 400 MHz PLL / 2 / (SYSDIV + 1) = 40 MHz.
const RCC_SYSDIV_40MHZ: u32 = 4 << 23;
const RIS_PLLLRIS: u32 = 1 << 6;

/// Run the core from the PLL at [`SYSTEM_CLOCK_HZ`].
pub fn init_system_clock(sysctl: &tm4c123x::SYSCTL) {
    // Bypass the PLL while it is reconfigured.
    sysctl
        .rcc
        .write(|w| unsafe { w.bits(RCC_BYPASS | RCC_XTAL_16MHZ | RCC_PWRDN) });
    sysctl
        .rcc
        .write(|w| unsafe { w.bits(RCC_BYPASS | RCC_XTAL_16MHZ) });
    sysctl.rcc.write(|w| unsafe {
        w.bits(RCC_BYPASS | RCC_XTAL_16MHZ | RCC_USESYSDIV | RCC_SYSDIV_40MHZ)
    });
    while sysctl.ris.read().bits() & RIS_PLLLRIS == 0 {}
    sysctl
        .rcc
        .write(|w| unsafe { w.bits(RCC_XTAL_16MHZ | RCC_USESYSDIV | RCC_SYSDIV_40MHZ) });
}

/// A few cycles must pass after a clock gate opens before the peripheral
/// accepts register writes.
fn settle() {
    cortex_m::asm::delay(6);
}

// ---------------------------------------------------------------------------
// EEPROM
// ---------------------------------------------------------------------------

const EEDONE_WORKING: u32 = 1 << 0;
const EEDONE_ERRORS: u32 = 0b11_1100;
const EESUPP_RETRY: u32 = 0b1100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromFault {
    /// Power-on self test left the array unusable.
    Unrecoverable,
    OutOfBounds,
    /// Raw EEDONE error bits of a failed program.
    Program(u32),
}

/// On-chip EEPROM addressed in 32-bit words.
pub struct Eeprom {
    eeprom: tm4c123x::EEPROM,
}

impl Eeprom {
    /// Power the EEPROM and wait out its recovery sequence.
    pub fn new(eeprom: tm4c123x::EEPROM, sysctl: &tm4c123x::SYSCTL) -> Result<Self, EepromFault> {
        sysctl.rcgceeprom.write(|w| unsafe { w.bits(1) });
        settle();
        Self::wait_idle(&eeprom);
        if eeprom.eesupp.read().bits() & EESUPP_RETRY != 0 {
            return Err(EepromFault::Unrecoverable);
        }

        sysctl.sreeprom.write(|w| unsafe { w.bits(1) });
        sysctl.sreeprom.write(|w| unsafe { w.bits(0) });
        settle();
        Self::wait_idle(&eeprom);
        if eeprom.eesupp.read().bits() & EESUPP_RETRY != 0 {
            return Err(EepromFault::Unrecoverable);
        }

        Ok(Self { eeprom })
    }

    fn wait_idle(eeprom: &tm4c123x::EEPROM) {
        while eeprom.eedone.read().bits() & EEDONE_WORKING != 0 {}
    }

    fn select(&mut self, address: u32) -> Result<(), EepromFault> {
        if address as usize >= STORE_WORDS {
            return Err(EepromFault::OutOfBounds);
        }
        let block = address / WORDS_PER_BLOCK;
        let offset = address % WORDS_PER_BLOCK;
        self.eeprom.eeblock.write(|w| unsafe { w.bits(block) });
        self.eeprom.eeoffset.write(|w| unsafe { w.bits(offset) });
        Ok(())
    }
}

impl WordStore for Eeprom {
    type Error = EepromFault;

    fn read_word(&mut self, address: u32) -> Result<u32, EepromFault> {
        self.select(address)?;
        Ok(self.eeprom.eerdwr.read().bits())
    }

    fn write_word(&mut self, address: u32, word: u32) -> Result<(), EepromFault> {
        self.select(address)?;
        self.eeprom.eerdwr.write(|w| unsafe { w.bits(word) });
        Self::wait_idle(&self.eeprom);
        let done = self.eeprom.eedone.read().bits();
        if done & EEDONE_ERRORS != 0 {
            return Err(EepromFault::Program(done & EEDONE_ERRORS));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hibernation RTC
// ---------------------------------------------------------------------------

const HIB_CTL_RTCEN: u32 = 1 << 0;
const HIB_CTL_CLK32EN: u32 = 1 << 6;
const HIB_CTL_WRC: u32 = 1 << 31;
const HIB_RTCALT0: u32 = 1 << 0;

/// Hibernation module RTC.
///
/// Zero-sized so it can live in a `static` clock peripheral; every access
/// goes through the PAC pointer. Writes must be gated on HIBCTL.WRC,
/// which [`SharedClockPeripheral`](crate::clock::SharedClockPeripheral)
/// does.
pub struct HibernationRtc {
    _private: (),
}

impl HibernationRtc {
    pub const fn new() -> Self {
        Self { _private: () }
    }

    fn hib(&self) -> &'static tm4c123x::hib::RegisterBlock {
        // SAFETY: the only handle to HIB is this zero-sized type, and every
        // access happens under the clock peripheral's lock.
        unsafe { &*tm4c123x::HIB::ptr() }
    }

    fn wait_write_complete(&self) {
        while !self.write_complete() {}
    }

    /// Start the 32.768 kHz oscillator and the counter, and route match
    /// register 0 to the HIBERNATE interrupt.
    pub fn enable(&mut self, sysctl: &tm4c123x::SYSCTL) {
        sysctl.rcgchib.write(|w| unsafe { w.bits(1) });
        settle();
        let hib = self.hib();
        self.wait_write_complete();
        hib.ctl.write(|w| unsafe { w.bits(HIB_CTL_CLK32EN) });
        self.wait_write_complete();
        hib.ctl
            .write(|w| unsafe { w.bits(HIB_CTL_CLK32EN | HIB_CTL_RTCEN) });
        self.wait_write_complete();
        hib.im.write(|w| unsafe { w.bits(HIB_RTCALT0) });
        self.wait_write_complete();
    }
}

impl Default for HibernationRtc {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcRegisters for HibernationRtc {
    fn write_complete(&self) -> bool {
        self.hib().ctl.read().bits() & HIB_CTL_WRC != 0
    }

    fn counter(&self) -> u32 {
        self.hib().rtcc.read().bits()
    }

    fn load_counter(&mut self, seconds: u32) {
        self.hib().rtcld.write(|w| unsafe { w.bits(seconds) });
    }

    fn match_value(&self) -> u32 {
        self.hib().rtcm0.read().bits()
    }

    fn set_match(&mut self, value: u32) {
        self.hib().rtcm0.write(|w| unsafe { w.bits(value) });
    }

    fn clear_alarm_interrupt(&mut self) {
        self.hib().ic.write(|w| unsafe { w.bits(HIB_RTCALT0) });
    }
}

// ---------------------------------------------------------------------------
// Auger PWM
// ---------------------------------------------------------------------------

const GPIOB: u32 = 1 << 1;
const PB7: u32 = 1 << 7;
/// PCTL function 4 on PB7 is M0PWM1.
const PB7_PCTL_M0PWM1: u32 = 4 << 28;
/// GENB: drive high on LOAD, low on CMPB down-count.
const GENB_HIGH_ON_LOAD_LOW_ON_CMPB: u32 = 0x0C08;
const PWM_CTL_ENABLE: u32 = 1 << 0;
const PWM_ENABLE_PWM1: u32 = 1 << 1;

/// PWM0 generator 0, output B on PB7.
pub struct AugerPwm {
    pwm: tm4c123x::PWM0,
}

impl AugerPwm {
    pub fn new(
        pwm: tm4c123x::PWM0,
        portb: &tm4c123x::GPIO_PORTB,
        sysctl: &tm4c123x::SYSCTL,
    ) -> Self {
        sysctl.rcgcpwm.modify(|r, w| unsafe { w.bits(r.bits() | 1) });
        sysctl
            .rcgcgpio
            .modify(|r, w| unsafe { w.bits(r.bits() | GPIOB) });
        settle();

        portb.afsel.modify(|r, w| unsafe { w.bits(r.bits() | PB7) });
        portb.pctl.modify(|r, w| unsafe {
            w.bits((r.bits() & !(0xF << 28)) | PB7_PCTL_M0PWM1)
        });
        portb.den.modify(|r, w| unsafe { w.bits(r.bits() | PB7) });

        pwm._0_ctl.write(|w| unsafe { w.bits(0) });
        pwm._0_genb
            .write(|w| unsafe { w.bits(GENB_HIGH_ON_LOAD_LOW_ON_CMPB) });
        pwm._0_load.write(|w| unsafe { w.bits(PWM_PERIOD) });
        pwm._0_cmpb.write(|w| unsafe { w.bits(0) });
        pwm._0_ctl.write(|w| unsafe { w.bits(PWM_CTL_ENABLE) });

        Self { pwm }
    }
}

/// Compare value for `intensity` percent duty.
fn duty_compare(intensity: u8) -> u32 {
    let intensity = u32::from(intensity.min(MAX_INTENSITY));
    // CMPB counts down from LOAD; it must stay strictly below it.
    (intensity * PWM_PERIOD / u32::from(MAX_INTENSITY)).min(PWM_PERIOD - 1)
}

impl Actuator for AugerPwm {
    fn start(&mut self, intensity: u8) {
        self.pwm
            ._0_cmpb
            .write(|w| unsafe { w.bits(duty_compare(intensity)) });
        self.pwm
            .enable
            .modify(|r, w| unsafe { w.bits(r.bits() | PWM_ENABLE_PWM1) });
    }

    fn stop(&mut self) {
        self.pwm
            .enable
            .modify(|r, w| unsafe { w.bits(r.bits() & !PWM_ENABLE_PWM1) });
    }
}

// ---------------------------------------------------------------------------
// Feeding timer
// ---------------------------------------------------------------------------

const WTIMER2: u32 = 1 << 2;
const TAMR_ONE_SHOT: u32 = 0x1;
const TIMER_CTL_TAEN: u32 = 1 << 0;
const TIMER_TATORIS: u32 = 1 << 0;

/// WTIMER2 as one 64-bit one-shot counter.
pub struct FeedTimer {
    timer: tm4c123x::WTIMER2,
}

impl FeedTimer {
    pub fn new(timer: tm4c123x::WTIMER2, sysctl: &tm4c123x::SYSCTL) -> Self {
        sysctl
            .rcgcwtimer
            .modify(|r, w| unsafe { w.bits(r.bits() | WTIMER2) });
        settle();

        timer.ctl.write(|w| unsafe { w.bits(0) });
        timer.cfg.write(|w| unsafe { w.bits(0) });
        timer.tamr.write(|w| unsafe { w.bits(TAMR_ONE_SHOT) });
        timer.icr.write(|w| unsafe { w.bits(TIMER_TATORIS) });
        timer.imr.write(|w| unsafe { w.bits(TIMER_TATORIS) });

        Self { timer }
    }
}

/// Counter ticks for a run of `seconds`; never zero.
fn run_ticks(seconds: u16) -> u64 {
    (u64::from(seconds) * u64::from(SYSTEM_CLOCK_HZ)).max(1)
}

impl OneShotTimer for FeedTimer {
    fn start(&mut self, seconds: u16) {
        let ticks = run_ticks(seconds);
        self.timer.ctl.write(|w| unsafe { w.bits(0) });
        // TBILR holds the upper word in 64-bit mode.
        self.timer
            .tbilr
            .write(|w| unsafe { w.bits((ticks >> 32) as u32) });
        self.timer.tailr.write(|w| unsafe { w.bits(ticks as u32) });
        self.timer.ctl.write(|w| unsafe { w.bits(TIMER_CTL_TAEN) });
    }

    fn stop(&mut self) {
        self.timer.ctl.write(|w| unsafe { w.bits(0) });
    }

    fn clear_interrupt(&mut self) {
        self.timer.icr.write(|w| unsafe { w.bits(TIMER_TATORIS) });
    }
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

const UART0: u32 = 1 << 0;
const GPIOA: u32 = 1 << 0;
const PA0_PA1: u32 = 0b11;
const PA_PCTL_UART0: u32 = 0x11;
/// 8 data bits, FIFOs on.
const LCRH_WLEN8_FEN: u32 = 0x70;
const UART_CTL_UARTEN_TXE_RXE: u32 = 0x301;
const FR_RXFE: u32 = 1 << 4;
const FR_TXFF: u32 = 1 << 5;

/// Blocking line console on UART0.
pub struct Uart0Console {
    uart: tm4c123x::UART0,
}

impl Uart0Console {
    pub fn new(
        uart: tm4c123x::UART0,
        porta: &tm4c123x::GPIO_PORTA,
        sysctl: &tm4c123x::SYSCTL,
    ) -> Self {
        sysctl
            .rcgcuart
            .modify(|r, w| unsafe { w.bits(r.bits() | UART0) });
        sysctl
            .rcgcgpio
            .modify(|r, w| unsafe { w.bits(r.bits() | GPIOA) });
        settle();

        porta
            .afsel
            .modify(|r, w| unsafe { w.bits(r.bits() | PA0_PA1) });
        porta.pctl.modify(|r, w| unsafe {
            w.bits((r.bits() & !0xFF) | PA_PCTL_UART0)
        });
        porta.den.modify(|r, w| unsafe { w.bits(r.bits() | PA0_PA1) });

        // Divisor in 1/64ths: 40 MHz / (16 * 115200) = 21 + 45/64.
        let divisor = (SYSTEM_CLOCK_HZ * 4 + CONSOLE_BAUD / 2) / CONSOLE_BAUD;
        uart.ctl.write(|w| unsafe { w.bits(0) });
        uart.ibrd.write(|w| unsafe { w.bits(divisor >> 6) });
        uart.fbrd.write(|w| unsafe { w.bits(divisor & 0x3F) });
        uart.lcrh.write(|w| unsafe { w.bits(LCRH_WLEN8_FEN) });
        uart.ctl.write(|w| unsafe { w.bits(UART_CTL_UARTEN_TXE_RXE) });

        Self { uart }
    }

    pub fn write_byte(&mut self, byte: u8) {
        while self.uart.fr.read().bits() & FR_TXFF != 0 {}
        self.uart.dr.write(|w| unsafe { w.bits(u32::from(byte)) });
    }

    pub fn read_byte(&mut self) -> u8 {
        while self.uart.fr.read().bits() & FR_RXFE != 0 {}
        self.uart.dr.read().bits() as u8
    }

    /// Read one line with echo into `buf`, returning the filled part.
    ///
    /// Input beyond the buffer is dropped; backspace edits.
    pub fn read_line<'b>(&mut self, buf: &'b mut [u8]) -> &'b str {
        let mut len = 0;
        loop {
            match self.read_byte() {
                b'\r' | b'\n' => {
                    self.write_byte(b'\r');
                    self.write_byte(b'\n');
                    break;
                }
                0x08 | 0x7F if len > 0 => {
                    len -= 1;
                    for b in [0x08, b' ', 0x08] {
                        self.write_byte(b);
                    }
                }
                byte @ 0x20..=0x7E if len < buf.len() => {
                    buf[len] = byte;
                    len += 1;
                    self.write_byte(byte);
                }
                _ => {}
            }
        }
        // Only printable ASCII is stored.
        core::str::from_utf8(&buf[..len]).unwrap_or("")
    }
}

impl fmt::Write for Uart0Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Interrupts
// ---------------------------------------------------------------------------

/// Unmask the alarm and feeding-timer interrupts.
///
/// # Safety
/// Both handlers must be installed and the state they touch initialised.
pub unsafe fn enable_interrupts() {
    NVIC::unmask(Interrupt::HIBERNATE);
    NVIC::unmask(Interrupt::WTIMER2A);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duty_compare_scales_to_period() {
        assert_eq!(duty_compare(0), 0);
        assert_eq!(duty_compare(50), 511);
        assert_eq!(duty_compare(100), PWM_PERIOD - 1, "Stays below LOAD");
        assert_eq!(duty_compare(200), PWM_PERIOD - 1, "Clamped");
    }

    #[test]
    fn test_run_ticks() {
        assert_eq!(run_ticks(0), 1, "Zero-length run still expires");
        assert_eq!(run_ticks(5), 200_000_000);
        assert_eq!(run_ticks(u16::MAX), 65_535 * 40_000_000, "Past 32 bits");
    }
}
