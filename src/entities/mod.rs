mod pin;

pub use pin::{seed_pins, Coordinates, NewPin, Pin};
