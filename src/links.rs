//! Quick links and their favicons.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheStore;

/// A bookmarked link shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub title: String,
  pub url: String,
}

/// Links used when none are configured.
pub fn default_links() -> Vec<Link> {
  vec![
    Link {
      title: "Google".to_string(),
      url: "https://www.google.com".to_string(),
    },
    Link {
      title: "GitHub".to_string(),
      url: "https://github.com".to_string(),
    },
  ]
}

/// Host part of `url`, if it parses and has one.
pub fn hostname(url: &str) -> Option<String> {
  Url::parse(url).ok()?.host_str().map(String::from)
}

/// Initials on a coloured disc, used when a site has no usable favicon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterBadge {
  pub letters: String,
  pub hue: u16,
  pub saturation: u8,
  pub lightness: u8,
}

impl LetterBadge {
  pub fn for_name(name: &str) -> Self {
    let (hue, saturation, lightness) = color_from_text(name);
    Self {
      letters: initials(name),
      hue,
      saturation,
      lightness,
    }
  }

  /// Serialized form kept in the favicon cache.
  pub fn to_cache_value(&self) -> String {
    format!(
      "badge:{}:{}:{}:{}",
      self.letters, self.hue, self.saturation, self.lightness
    )
  }

  pub fn from_cache_value(value: &str) -> Option<Self> {
    let mut parts = value.strip_prefix("badge:")?.split(':');
    let letters = parts.next()?.to_string();
    let hue = parts.next()?.parse().ok()?;
    let saturation = parts.next()?.parse().ok()?;
    let lightness = parts.next()?.parse().ok()?;
    Some(Self {
      letters,
      hue,
      saturation,
      lightness,
    })
  }

  /// The badge colour as 8-bit RGB.
  pub fn rgb(&self) -> (u8, u8, u8) {
    hsl_to_rgb(self.hue, self.saturation, self.lightness)
  }
}

/// How a link's icon is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Favicon {
  /// A previously resolved icon URL
  Url(String),
  Badge(LetterBadge),
}

/// Look up the favicon for `link`, generating and caching a letter badge on a miss.
pub fn resolve_favicon(store: &CacheStore, link: &Link) -> Favicon {
  let Some(host) = hostname(&link.url) else {
    return Favicon::Badge(LetterBadge::for_name(&link.title));
  };

  if let Some(cached) = store.cached_favicon(&host) {
    return match LetterBadge::from_cache_value(&cached) {
      Some(badge) => Favicon::Badge(badge),
      None => Favicon::Url(cached),
    };
  }

  let badge = LetterBadge::for_name(&link.title);
  store.cache_favicon(&host, &badge.to_cache_value());
  Favicon::Badge(badge)
}

/// Up to two upper-case initials: first and last word, or the first two letters of a single word.
pub fn initials(name: &str) -> String {
  let words: Vec<&str> = name.split_whitespace().collect();
  let letters: String = match words.as_slice() {
    [] => "L".to_string(),
    [word] => word.chars().take(2).collect(),
    [first, .., last] => first.chars().take(1).chain(last.chars().take(1)).collect(),
  };
  letters.to_uppercase().chars().take(2).collect()
}

/// Hue, saturation and lightness derived from a rolling hash of `text`.
///
/// Only the shift is truncated to 32 bits; the subtraction and addition keep the
/// full accumulator, so long titles hash past the `i32` range.
fn color_from_text(text: &str) -> (u16, u8, u8) {
  let hash = text.encode_utf16().fold(0i64, |hash, c| {
    let shifted = ((hash as i32) << 5) as i64;
    (c as i64).wrapping_add(shifted.wrapping_sub(hash))
  });

  let hue = (hash % 360).unsigned_abs() as u16;
  let saturation = (65 + hash % 20) as u8;
  let lightness = (40 + hash % 15) as u8;
  (hue, saturation, lightness)
}

fn hsl_to_rgb(hue: u16, saturation: u8, lightness: u8) -> (u8, u8, u8) {
  let s = saturation as f64 / 100.0;
  let l = lightness as f64 / 100.0;
  let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
  let h = (hue % 360) as f64 / 60.0;
  let x = c * (1.0 - (h % 2.0 - 1.0).abs());
  let (r, g, b) = match h as u8 {
    0 => (c, x, 0.0),
    1 => (x, c, 0.0),
    2 => (0.0, c, x),
    3 => (0.0, x, c),
    4 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };
  let m = l - c / 2.0;
  let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
  (channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStorage, PolicyTable};
  use std::sync::Arc;

  #[test]
  fn test_hostname() {
    assert_eq!(
      hostname("https://www.google.com/search?q=x").as_deref(),
      Some("www.google.com")
    );
    assert_eq!(hostname("not a url"), None);
  }

  #[test]
  fn test_initials() {
    assert_eq!(initials("Google"), "GO");
    assert_eq!(initials("hacker news daily"), "HD");
    assert_eq!(initials("X"), "X");
    assert_eq!(initials("   "), "L");
  }

  #[test]
  fn test_badge_color_is_stable_and_in_range() {
    let a = LetterBadge::for_name("GitHub");
    let b = LetterBadge::for_name("GitHub");
    assert_eq!(a, b);
    for name in ["GitHub", "Google", "a very long bookmark title", "é"] {
      let badge = LetterBadge::for_name(name);
      assert!(badge.hue < 360);
      assert!((46..85).contains(&badge.saturation));
      assert!((26..55).contains(&badge.lightness));
    }
  }

  #[test]
  fn test_badge_cache_value_round_trip() {
    let badge = LetterBadge::for_name("Docs Site");
    assert_eq!(
      LetterBadge::from_cache_value(&badge.to_cache_value()),
      Some(badge)
    );
    assert_eq!(LetterBadge::from_cache_value("https://x/favicon.ico"), None);
  }

  #[test]
  fn test_color_from_text_keeps_wide_accumulator() {
    assert_eq!(color_from_text("GitHub"), (277, 48, 33));
    assert_eq!(color_from_text("Google"), (191, 54, 29));
    assert_eq!(color_from_text("a very long bookmark title"), (311, 76, 51));
  }

  #[test]
  fn test_hsl_to_rgb() {
    assert_eq!(hsl_to_rgb(0, 100, 50), (255, 0, 0));
    assert_eq!(hsl_to_rgb(120, 100, 50), (0, 255, 0));
    assert_eq!(hsl_to_rgb(240, 100, 50), (0, 0, 255));
    assert_eq!(hsl_to_rgb(0, 0, 100), (255, 255, 255));
  }

  #[test]
  fn test_resolve_favicon_caches_badge() {
    let store = CacheStore::new(Arc::new(MemoryStorage::new()), PolicyTable::default());
    let link = Link {
      title: "Rust Docs".into(),
      url: "https://docs.rs".into(),
    };

    let first = resolve_favicon(&store, &link);
    assert!(matches!(first, Favicon::Badge(ref b) if b.letters == "RD"));
    assert!(store.cached_favicon("docs.rs").is_some());
    assert_eq!(resolve_favicon(&store, &link), first);

    store.cache_favicon("docs.rs", "https://docs.rs/favicon.ico");
    assert_eq!(
      resolve_favicon(&store, &link),
      Favicon::Url("https://docs.rs/favicon.ico".into())
    );
  }
}
