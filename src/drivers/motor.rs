//! Dual H-bridge on the four TIM1 compare channels.

use balance_core::{DutyPair, PwmStage, MAX_DUTY};
use embassy_stm32::timer::simple_pwm::SimplePwm;
use embassy_stm32::timer::{CaptureCompare16bitInstance, Channel};

pub struct HBridge<'d, T: CaptureCompare16bitInstance> {
    pwm: SimplePwm<'d, T>,
    max_duty: u16,
}

impl<'d, T: CaptureCompare16bitInstance> HBridge<'d, T> {
    /// Takes a timer with all four channels mapped; outputs start braked.
    pub fn new(mut pwm: SimplePwm<'d, T>) -> Self {
        let max_duty = pwm.get_max_duty();
        for ch in [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4] {
            pwm.set_duty(ch, max_duty);
            pwm.enable(ch);
        }
        if max_duty != MAX_DUTY {
            defmt::warn!("PWM auto-reload {} != {}, duties rescaled", max_duty, MAX_DUTY);
        }
        Self { pwm, max_duty }
    }

    fn scale(&self, duty: u16) -> u16 {
        (u32::from(duty.min(MAX_DUTY)) * u32::from(self.max_duty) / u32::from(MAX_DUTY)) as u16
    }
}

impl<'d, T: CaptureCompare16bitInstance> PwmStage for HBridge<'d, T> {
    fn apply(&mut self, left: DutyPair, right: DutyPair) {
        let duties = [
            (Channel::Ch1, left.a),
            (Channel::Ch2, left.b),
            (Channel::Ch3, right.a),
            (Channel::Ch4, right.b),
        ];
        for (ch, duty) in duties {
            let scaled = self.scale(duty);
            self.pwm.set_duty(ch, scaled);
        }
    }
}
