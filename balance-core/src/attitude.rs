/// One attitude estimate from the motion unit.
///
/// Angles in degrees, accelerations in g, rates in degrees per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attitude {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
}

/// Source of attitude estimates, polled once per control tick.
///
/// Implementations must return promptly. `None` means nothing new arrived
/// since the previous call; the caller keeps using its last estimate.
pub trait AttitudeProvider {
    fn attitude(&mut self) -> Option<Attitude>;
}

impl<F: FnMut() -> Option<Attitude>> AttitudeProvider for F {
    fn attitude(&mut self) -> Option<Attitude> {
        self()
    }
}
