//! Keyboard input.
use crate::constants::*;

/// Snapshot of the whole keyboard, indexed by key value.
pub type KeySnapshot = [bool; KEY_COUNT as usize];

/// One of the 16 keys of the COSMAC VIP hex keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    /// All keys in order of their value.
    #[rustfmt::skip]
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0, Self::Key1, Self::Key2, Self::Key3,
        Self::Key4, Self::Key5, Self::Key6, Self::Key7,
        Self::Key8, Self::Key9, Self::KeyA, Self::KeyB,
        Self::KeyC, Self::KeyD, Self::KeyE, Self::KeyF,
    ];

    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Build a keyboard snapshot where only the given keys are held down.
    pub fn snapshot<'a>(keys: impl IntoIterator<Item = &'a KeyCode>) -> KeySnapshot {
        let mut snapshot = [false; KEY_COUNT as usize];
        for key in keys {
            snapshot[key.as_u8() as usize] = true;
        }
        snapshot
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(key_id as usize)
            .copied()
            .ok_or(InvalidKeyCode)
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(feature = "serde")]
mod de {
    use std::fmt::Display;

    use num_traits::AsPrimitive;
    use serde::de::{Deserialize, Error, Expected, Unexpected, Visitor};

    use super::*;

    impl Expected for InvalidKeyCode {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            <Self as Display>::fmt(self, f)
        }
    }

    impl<'de> Deserialize<'de> for KeyCode {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            // YAML integer type
            deserializer.deserialize_i64(KeyCodeVisitor)
        }
    }

    struct KeyCodeVisitor;

    impl KeyCodeVisitor {
        #[inline]
        fn to_keycode<N, E>(val: N) -> Result<KeyCode, E>
        where
            N: AsPrimitive<i64>,
            E: Error,
        {
            let n = val.as_();
            if n < 0 || n > u8::MAX as i64 {
                return Err(E::invalid_value(Unexpected::Signed(n), &InvalidKeyCode));
            }

            KeyCode::try_from(n as u8).map_err(|err| E::invalid_value(Unexpected::Signed(n), &err))
        }
    }

    impl<'de> Visitor<'de> for KeyCodeVisitor {
        type Value = KeyCode;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "an integer key value between 0 and 15")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Self::to_keycode(v)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Self::to_keycode(v)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keycode_conversion() {
        for key_id in 0..KEY_COUNT {
            let keycode = KeyCode::try_from(key_id).unwrap();
            assert_eq!(u8::from(keycode), key_id);
        }
        assert!(KeyCode::try_from(KEY_COUNT).is_err());
        assert_eq!(KeyCode::KeyB.to_string(), "kb");
    }

    #[test]
    fn test_snapshot() {
        let snapshot = KeyCode::snapshot(&[KeyCode::Key1, KeyCode::KeyF]);
        assert_eq!(snapshot.iter().filter(|k| **k).count(), 2);
        assert!(snapshot[0x1]);
        assert!(snapshot[0xF]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_keycodes() {
        let keys: Vec<KeyCode> = serde_yaml::from_str("[0, 5, 15]").unwrap();
        assert_eq!(keys, vec![KeyCode::Key0, KeyCode::Key5, KeyCode::KeyF]);

        assert!(serde_yaml::from_str::<KeyCode>("16").is_err());
        assert!(serde_yaml::from_str::<KeyCode>("-1").is_err());
    }
}
