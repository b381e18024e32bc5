//! Key identifiers relevant to panic detection
//!
//! Volume buttons reach the tap two ways: as ordinary key-down events
//! carrying a virtual key code, or, on built-in and Apple keyboards, as
//! NSSystemDefined media-key events. Both are mapped onto `Key` here.

/// Virtual key codes from HIToolbox Events.h
pub mod keycodes {
    /// kVK_VolumeUp
    pub const VOLUME_UP: u16 = 0x48;
    /// kVK_VolumeDown
    pub const VOLUME_DOWN: u16 = 0x49;
}

/// Media key codes and markers from IOKit/hidsystem (NX_*)
pub mod media {
    /// NSSystemDefined event type
    pub const NX_SYSDEFINED: u32 = 14;
    /// Subtype used for media (aux control) buttons
    pub const NX_SUBTYPE_AUX_CONTROL_BUTTONS: i16 = 8;
    pub const NX_KEYTYPE_SOUND_UP: u32 = 0;
    pub const NX_KEYTYPE_SOUND_DOWN: u32 = 1;
    /// Key state byte for a press; 0x0B is a release
    pub const KEY_STATE_DOWN: u32 = 0x0A;
}

/// A key reported by a key-down event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    VolumeUp,
    VolumeDown,
    /// Any other key, carrying its raw code
    Other(u16),
}

impl Key {
    /// Classify a raw virtual key code
    pub fn from_keycode(code: u16) -> Self {
        match code {
            keycodes::VOLUME_UP => Key::VolumeUp,
            keycodes::VOLUME_DOWN => Key::VolumeDown,
            other => Key::Other(other),
        }
    }

    /// Decode an NSSystemDefined event from its `subtype` and `data1`
    ///
    /// `data1` holds the media key code in its upper 16 bits and the key
    /// state in bits 8..16. Returns `None` for anything but a media key
    /// press.
    pub fn from_system_defined(subtype: i16, data1: i64) -> Option<Self> {
        if subtype != media::NX_SUBTYPE_AUX_CONTROL_BUTTONS {
            return None;
        }

        let data1 = data1 as u64;
        let key_code = ((data1 & 0xFFFF_0000) >> 16) as u32;
        let key_state = ((data1 & 0xFF00) >> 8) as u32;
        if key_state != media::KEY_STATE_DOWN {
            return None;
        }

        Some(match key_code {
            media::NX_KEYTYPE_SOUND_UP => Key::VolumeUp,
            media::NX_KEYTYPE_SOUND_DOWN => Key::VolumeDown,
            other => Key::Other(other as u16),
        })
    }

    /// Whether this key counts toward the panic threshold
    pub fn is_qualifying(&self) -> bool {
        matches!(self, Key::VolumeUp | Key::VolumeDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data1(key_code: u32, key_state: u32) -> i64 {
        ((key_code << 16) | (key_state << 8)) as i64
    }

    #[test]
    fn test_volume_keys() {
        assert_eq!(Key::from_keycode(0x48), Key::VolumeUp);
        assert_eq!(Key::from_keycode(0x49), Key::VolumeDown);
        assert!(Key::VolumeUp.is_qualifying());
        assert!(Key::VolumeDown.is_qualifying());
    }

    #[test]
    fn test_other_keys() {
        let mute = Key::from_keycode(0x4A);
        assert_eq!(mute, Key::Other(0x4A));
        assert!(!mute.is_qualifying());
        assert!(!Key::from_keycode(0).is_qualifying());
    }

    #[test]
    fn test_media_volume_presses() {
        assert_eq!(
            Key::from_system_defined(8, data1(media::NX_KEYTYPE_SOUND_UP, 0x0A)),
            Some(Key::VolumeUp)
        );
        assert_eq!(
            Key::from_system_defined(8, data1(media::NX_KEYTYPE_SOUND_DOWN, 0x0A)),
            Some(Key::VolumeDown)
        );
    }

    #[test]
    fn test_media_repeat_flag_still_counts() {
        let repeat = data1(media::NX_KEYTYPE_SOUND_UP, 0x0A) | 0x1;
        assert_eq!(Key::from_system_defined(8, repeat), Some(Key::VolumeUp));
    }

    #[test]
    fn test_media_release_ignored() {
        assert_eq!(
            Key::from_system_defined(8, data1(media::NX_KEYTYPE_SOUND_UP, 0x0B)),
            None
        );
    }

    #[test]
    fn test_other_media_keys_and_subtypes() {
        // NX_KEYTYPE_PLAY
        let play = Key::from_system_defined(8, data1(16, 0x0A));
        assert_eq!(play, Some(Key::Other(16)));
        assert!(!play.unwrap().is_qualifying());

        assert_eq!(
            Key::from_system_defined(0, data1(media::NX_KEYTYPE_SOUND_UP, 0x0A)),
            None
        );
    }
}
