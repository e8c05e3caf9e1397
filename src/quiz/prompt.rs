use crate::quiz::grade::SchoolLevel;

/// How many of the most recent questions are quoted back to the model.
pub const MAX_PREVIOUS: usize = 10;

pub const SYSTEM_INSTRUCTION: &str =
    "You are a creative teacher generating trivia questions. Respond only with valid JSON.";

const RESPONSE_EXAMPLE: &str = r#"{
    "Question": "What is 2 + 2?",
    "A": "3",
    "B": "4",
    "C": "5",
    "D": "6",
    "Answer": "B",
    "Explanation": "2 + 2 equals 4.",
    "Category": "Math"
}"#;

pub fn build_prompt(category: &str, grade: u8, history: &[String]) -> String {
    let school_level = SchoolLevel::from_grade(grade);
    let start = history.len().saturating_sub(MAX_PREVIOUS);
    let previous_questions = history[start..].join("\n");

    format!(
        "You are a creative teacher creating unique and varied trivia questions for {school_level} School students. \
        Each question should be associated with a specific category. \
        Avoid repeating any previous questions.\n\n\
        Create a new multiple-choice trivia question about {category} suitable for grade {grade}.\n\n\
        You must respond with a valid JSON object containing exactly these keys: Question, A, B, C, D, Answer, Explanation, and Category.\n\n\
        The Answer must be either 'A', 'B', 'C', or 'D' corresponding to the correct option.\n\n\
        Previous questions to avoid:\n\
        {previous_questions}\n\n\
        Response format example:\n\
        {RESPONSE_EXAMPLE}\n\n\
        Ensure your response is exactly in this JSON format with no additional text before or after. \
        Do not include any markdown formatting or code blocks in your response."
    )
}
