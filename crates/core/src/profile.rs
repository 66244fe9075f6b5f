//! Output profiles
//!
//! A profile is a named bounding box. Each profile owns one flat sub-directory
//! of the asset root, named after the profile.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    /// Sub-directory name, e.g. `320x200`
    pub name: String,
    pub max_width: u32,
    pub max_height: u32,
}

impl Profile {
    /// Profile named by its dimension string
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            name: format!("{}x{}", max_width, max_height),
            max_width,
            max_height,
        }
    }

    /// The fixed profile table: 320x200 and 800x600
    pub fn defaults() -> Vec<Profile> {
        vec![Profile::new(320, 200), Profile::new(800, 600)]
    }

    /// Target dimensions for a `width x height` source under "contain" fit
    ///
    /// Aspect ratio is preserved and sources already inside the bounds keep
    /// their size. Otherwise at least one bound is hit exactly.
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width && height <= self.max_height {
            return (width, height);
        }
        if width == 0 || height == 0 {
            return (width.min(self.max_width), height.min(self.max_height));
        }

        let src_aspect = width as f64 / height as f64;
        let max_aspect = self.max_width as f64 / self.max_height as f64;

        let (w, h) = if src_aspect > max_aspect {
            let h = (self.max_width as f64 / src_aspect).round() as u32;
            (self.max_width, h)
        } else {
            let w = (self.max_height as f64 * src_aspect).round() as u32;
            (w, self.max_height)
        };

        (w.clamp(1, self.max_width), h.clamp(1, self.max_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let profiles = Profile::defaults();
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["320x200", "800x600"]);
        assert_eq!(profiles[1].max_width, 800);
        assert_eq!(profiles[1].max_height, 600);
    }

    #[test]
    fn test_fit_wide_source_hits_width() {
        let profile = Profile::new(320, 200);
        let (w, h) = profile.fit(4000, 1000);
        assert_eq!((w, h), (320, 80));
        // 4:1 preserved
        assert_eq!(w / h, 4);
    }

    #[test]
    fn test_fit_tall_source_hits_height() {
        let profile = Profile::new(320, 200);
        assert_eq!(profile.fit(1000, 4000), (50, 200));
    }

    #[test]
    fn test_fit_never_upscales() {
        let profile = Profile::new(800, 600);
        assert_eq!(profile.fit(400, 100), (400, 100));
        assert_eq!(profile.fit(800, 600), (800, 600));
    }

    #[test]
    fn test_fit_extreme_aspect_keeps_one_pixel() {
        let profile = Profile::new(320, 200);
        let (w, h) = profile.fit(100_000, 10);
        assert_eq!(w, 320);
        assert_eq!(h, 1);
    }
}
