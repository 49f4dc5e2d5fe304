//! Creature presentation derived from the displayed mood

use std::fmt;

/// Face the group creature shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatureFace {
    Happy,
    Neutral,
    Sad,
}

impl CreatureFace {
    pub fn for_mood(mood: u8) -> Self {
        match mood {
            51.. => CreatureFace::Happy,
            11..=50 => CreatureFace::Neutral,
            _ => CreatureFace::Sad,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            CreatureFace::Happy => "(^‿^)",
            CreatureFace::Neutral => "(•_•)",
            CreatureFace::Sad => "(╥﹏╥)",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CreatureFace::Happy => "happy",
            CreatureFace::Neutral => "meh",
            CreatureFace::Sad => "sad",
        }
    }
}

impl fmt::Display for CreatureFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.glyph(), self.label())
    }
}

/// Render a fixed-width bar for a 0..=100 mood
pub fn mood_bar(mood: u8, width: usize) -> String {
    let mood = usize::from(mood.min(100));
    let filled = (mood * width + 50) / 100;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.extend(std::iter::repeat('#').take(filled));
    bar.extend(std::iter::repeat('-').take(width - filled));
    bar.push(']');
    bar
}
