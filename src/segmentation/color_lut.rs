use crate::volume::{Label, BACKGROUND};

/// An RGB triple.
pub type Rgb = [u8; 3];

const PALETTE: [Rgb; 16] = [
    [221, 84, 84],
    [77, 228, 121],
    [166, 70, 235],
    [189, 180, 116],
    [109, 182, 196],
    [204, 101, 157],
    [121, 211, 81],
    [96, 120, 226],
    [232, 164, 79],
    [80, 208, 190],
    [238, 123, 198],
    [157, 130, 92],
    [70, 161, 109],
    [201, 201, 79],
    [133, 91, 190],
    [226, 126, 108],
];

/// Ordered mapping from class index to display color.
///
/// Index 0 is background and is always black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorLut {
    colors: Vec<Rgb>,
}

impl Default for ColorLut {
    fn default() -> Self {
        let mut colors = Vec::with_capacity(256);
        colors.push([0, 0, 0]);
        colors.extend(PALETTE.iter().cycle().take(255).copied());
        Self { colors }
    }
}

impl ColorLut {
    /// Creates a table from explicit colors for classes `1..`.
    #[must_use]
    pub fn from_colors(colors: impl IntoIterator<Item = Rgb>) -> Self {
        let mut table = vec![[0, 0, 0]];
        table.extend(colors);
        Self { colors: table }
    }

    /// Color of a class, if the table defines one.
    #[must_use]
    pub fn color(&self, class: Label) -> Option<Rgb> {
        self.colors.get(usize::from(class)).copied()
    }

    /// Sets the color of a class, growing the table with palette colors.
    ///
    /// The background entry cannot be changed; returns `false` in that case.
    pub fn set_color(&mut self, class: Label, color: Rgb) -> bool {
        if class == BACKGROUND {
            return false;
        }
        let idx = usize::from(class);
        while self.colors.len() <= idx {
            let next = PALETTE[(self.colors.len() - 1) % PALETTE.len()];
            self.colors.push(next);
        }
        self.colors[idx] = color;
        true
    }

    /// Number of entries, background included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_black() {
        let lut = ColorLut::default();
        assert_eq!(lut.color(0), Some([0, 0, 0]));
        assert_eq!(lut.len(), 256);
        assert_eq!(lut.color(1), Some(PALETTE[0]));
    }

    #[test]
    fn set_color_grows() {
        let mut lut = ColorLut::from_colors([[1, 2, 3]]);
        assert_eq!(lut.color(5), None);
        assert!(lut.set_color(5, [9, 9, 9]));
        assert_eq!(lut.color(5), Some([9, 9, 9]));
        assert_eq!(lut.color(1), Some([1, 2, 3]));
        assert_eq!(lut.len(), 6);
    }

    #[test]
    fn background_is_fixed() {
        let mut lut = ColorLut::default();
        assert!(!lut.set_color(0, [255, 255, 255]));
        assert_eq!(lut.color(0), Some([0, 0, 0]));
    }
}
