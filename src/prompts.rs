//! Prompt text sent to the generative model. The parser in `parser.rs`
//! depends on the output formats requested here.

pub fn definition_prompt(word: &str) -> String {
    format!(
        "For the word '{word}', provide ONLY its top 3 most commonly used meanings \
(if it has less than 3 meanings, provide only the existing ones). Use this format:

1st Most Common Meaning:
[Definition]
Example: [A clear example sentence showing this meaning]

2nd Most Common Meaning (if exists):
[Definition]
Example: [A clear example sentence showing this meaning]

3rd Most Common Meaning (if exists):
[Definition]
Example: [A clear example sentence showing this meaning]

Note: Only provide real, commonly used meanings. If the word has less than 3 meanings, \
only provide the existing ones."
    )
}

/// `scene` is the example sentence for the meaning, or its definition when
/// the model gave no example.
pub fn image_prompt(word: &str, scene: &str) -> String {
    format!(
        "Describe visually the meaning of word '{word}' in this sentence: {scene}

Requirements:
- Natural and realistic scene
- No text in the image
- Simple background
- Clear focus on the action or object being described"
    )
}

pub fn story_prompt(words: &[String]) -> String {
    format!(
        "Write a simple, short story using these words: {}. The story should be easy to \
understand and help in learning these words.",
        words.join(", ")
    )
}

pub fn quiz_prompt(words: &[String]) -> String {
    format!(
        "Create 4 multiple choice questions to test the knowledge of these words: {}
Each question should be in this exact format:
Q: [Question text]
A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]
Correct: [A/B/C/D]
Explanation: [Brief explanation why this is correct]
---
Make sure each question tests different aspects (meaning, usage, context) and each word \
is used at least once.",
        words.join(", ")
    )
}
