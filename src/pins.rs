//! GPIO / peripheral pin assignments for the PetFeeder main board (ESP32).
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Load cell amplifier (HX711, bit-banged two-wire)
// ---------------------------------------------------------------------------

/// Digital input: HX711 DOUT. LOW = conversion ready.
pub const LOADCELL_DOUT_GPIO: i32 = 16;
/// Digital output: HX711 PD_SCK clock.
pub const LOADCELL_SCK_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// Ultrasonic ranger (HC-SR04) above the water tank
// ---------------------------------------------------------------------------

/// Digital output: 10 µs trigger pulse.
pub const SONAR_TRIG_GPIO: i32 = 18;
/// Digital input: echo pulse, width proportional to distance.
pub const SONAR_ECHO_GPIO: i32 = 19;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// LEDC PWM output driving the hatch servo.
pub const HATCH_SERVO_GPIO: i32 = 13;
/// Digital output: pump relay coil (active HIGH).
pub const PUMP_RELAY_GPIO: i32 = 26;

// ---------------------------------------------------------------------------
// User button (active-low with internal pull-up)
// ---------------------------------------------------------------------------

/// Manual feed / confirm button.
pub const BUTTON_GPIO: i32 = 27;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// Standard hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// LEDC resolution for the servo channel. 14 bits at 50 Hz gives ~1.2 µs steps.
pub const SERVO_PWM_RESOLUTION_BITS: u32 = 14;
/// Pulse width at 0° (µs).
pub const SERVO_MIN_PULSE_US: u32 = 500;
/// Pulse width at 180° (µs).
pub const SERVO_MAX_PULSE_US: u32 = 2_500;
