use std::fmt;

/// The reported state of the fridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FridgeState {
    /// The temperature measured inside the fridge in °C
    pub actual_temp_c: i8,
    /// The temperature the fridge is regulating towards in °C
    pub target_temp_c: i8,
    /// Remaining battery charge in %
    pub battery_pct: u8,
    /// Whole volts of the supply voltage
    pub battery_voltage_v: u8,
    /// Tenths digit of the supply voltage
    pub battery_voltage_dv: u8,
}

impl FridgeState {
    /// The supply voltage in the same `volts.tenths` form the fridge app shows
    pub fn battery_voltage(&self) -> String {
        format!("{}.{}", self.battery_voltage_v, self.battery_voltage_dv)
    }
}

impl fmt::Display for FridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Actual temperature: {}°C", self.actual_temp_c)?;
        writeln!(f, "Target temperature: {}°C", self.target_temp_c)?;
        write!(f, "Battery: {}% ({}V)", self.battery_pct, self.battery_voltage())
    }
}

#[test]
fn test_display() {
    let state = FridgeState {
        actual_temp_c: -3,
        target_temp_c: -5,
        battery_pct: 87,
        battery_voltage_v: 12,
        battery_voltage_dv: 6,
    };
    assert_eq!(
        state.to_string(),
        "Actual temperature: -3°C\nTarget temperature: -5°C\nBattery: 87% (12.6V)"
    );
}
