bitflags::bitflags! {
    /// Client-declared capability flags gating which event categories are
    /// pushed to a session. A mask of 0 is silent mode: the session still
    /// receives direct replies but no push events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Intents: u32 {
        const DIRECT_MESSAGES = 1 << 0;
        const PRESENCES = 1 << 1;
        const GUILDS = 1 << 2;
        const GUILD_CHANNELS = 1 << 3;
        const GUILD_MEMBERS = 1 << 4;
        const GUILD_MESSAGES = 1 << 5;
    }
}

impl Intents {
    /// Decode a raw mask. Unknown high bits are ignored.
    pub fn decode(mask: u32) -> Self {
        Self::from_bits_truncate(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mask_is_silent() {
        assert!(Intents::decode(0).is_empty());
    }

    #[test]
    fn bit_layout_is_lsb_first() {
        assert!(Intents::decode(1).contains(Intents::DIRECT_MESSAGES));
        assert!(Intents::decode(1 << 1).contains(Intents::PRESENCES));
        assert!(Intents::decode(1 << 2).contains(Intents::GUILDS));
        assert!(Intents::decode(1 << 3).contains(Intents::GUILD_CHANNELS));
        assert!(Intents::decode(1 << 4).contains(Intents::GUILD_MEMBERS));
        assert!(Intents::decode(1 << 5).contains(Intents::GUILD_MESSAGES));
    }

    #[test]
    fn combined_mask_decodes_each_flag_independently() {
        let intents = Intents::decode((1 << 1) | (1 << 5));
        assert!(intents.contains(Intents::PRESENCES));
        assert!(intents.contains(Intents::GUILD_MESSAGES));
        assert!(!intents.contains(Intents::GUILDS));
    }

    #[test]
    fn unknown_bits_are_ignored() {
        assert_eq!(Intents::decode(0xffff_ffff), Intents::all());
    }
}
