use std::fmt;

pub const MIN_GRADE: u8 = 1;
pub const MAX_GRADE: u8 = 12;
pub const DEFAULT_GRADE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SchoolLevel {
    Elementary,
    Middle,
    High,
}

impl SchoolLevel {
    /// Grades up to 5 are elementary, 6 to 8 middle school, the rest high school.
    /// Out-of-range grades are not clamped.
    pub fn from_grade(grade: u8) -> Self {
        match grade {
            0..=5 => SchoolLevel::Elementary,
            6..=8 => SchoolLevel::Middle,
            _ => SchoolLevel::High,
        }
    }

    pub fn indicator(&self) -> &'static str {
        match self {
            SchoolLevel::Elementary => "🎈",
            SchoolLevel::Middle => "🌟",
            SchoolLevel::High => "🎓",
        }
    }
}

impl fmt::Display for SchoolLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SchoolLevel::Elementary => "Elementary",
            SchoolLevel::Middle => "Middle",
            SchoolLevel::High => "High",
        };
        f.write_str(label)
    }
}

pub fn grade_level_info(grade: u8) -> (SchoolLevel, &'static str) {
    let level = SchoolLevel::from_grade(grade);
    (level, level.indicator())
}

pub fn is_valid_grade(grade: u8) -> bool {
    (MIN_GRADE..=MAX_GRADE).contains(&grade)
}
