use rand::seq::SliceRandom;
use rand::Rng;

pub const STEM_CATEGORIES: [&str; 9] = [
    "Science",
    "Technology",
    "Engineering",
    "Math",
    "Space",
    "Animals",
    "Nature",
    "Geography",
    "Biology",
];

/// Fixed set of topics plus the ones already asked in the current rotation cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CategoryPool {
    categories: Vec<String>,
    used: Vec<String>,
}

impl Default for CategoryPool {
    fn default() -> Self {
        Self {
            categories: STEM_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            used: Vec::new(),
        }
    }
}

impl CategoryPool {
    /// Returns `None` for an empty list, so `pick` always has something to return.
    pub fn new(categories: Vec<String>) -> Option<Self> {
        if categories.is_empty() {
            return None;
        }
        Some(Self {
            categories,
            used: Vec::new(),
        })
    }

    /// Picks a category not used in this cycle. Once every category has been
    /// used the cycle restarts.
    pub fn pick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        let mut available: Vec<&String> = self
            .categories
            .iter()
            .filter(|c| !self.used.contains(c))
            .collect();
        if available.is_empty() {
            log::debug!("All {} categories used, starting a new cycle", self.categories.len());
            self.used.clear();
            available = self.categories.iter().collect();
        }

        // `categories` is never empty, see `new`
        let category = match available.choose(rng) {
            Some(category) => (*category).clone(),
            None => self.categories[0].clone(),
        };
        self.used.push(category.clone());
        category
    }

    pub fn reset(&mut self) {
        self.used.clear();
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn used(&self) -> &[String] {
        &self.used
    }
}
