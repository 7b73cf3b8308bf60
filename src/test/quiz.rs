#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};

    use crate::models::QuizQuestion;
    use crate::parser::parse_quiz;
    use crate::quiz::{QuizStash, grade, score_percentage};
    use crate::test::test_utils::QUIZ_OUTPUT;

    fn questions() -> Vec<QuizQuestion> {
        parse_quiz(QUIZ_OUTPUT).expect("fixture parses")
    }

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_grade_all_correct() {
        let outcome = grade(
            &questions(),
            &answers(&[("q0", "A"), ("q1", "B"), ("q2", "C"), ("q3", "D")]),
        );

        assert_eq!(outcome.total_correct, 4);
        assert_eq!(outcome.total_questions, 4);
        assert_eq!(outcome.score_percentage, 100.0);
        assert!(outcome.results.iter().all(|r| r.is_correct));
    }

    #[test]
    fn test_grade_none_answered() {
        let outcome = grade(&questions(), &HashMap::new());

        assert_eq!(outcome.total_correct, 0);
        assert_eq!(outcome.score_percentage, 0.0);
        assert!(outcome.results.iter().all(|r| r.user_answer.is_none()));
    }

    #[test]
    fn test_grade_partial_is_case_insensitive() {
        let outcome = grade(
            &questions(),
            &answers(&[("q0", "a"), ("q1", " b "), ("q2", "A"), ("q9", "D")]),
        );

        assert_eq!(outcome.total_correct, 2);
        assert_eq!(outcome.score_percentage, 50.0);

        let third = &outcome.results[2];
        assert!(!third.is_correct);
        assert_eq!(third.user_answer.as_deref(), Some("A"));
        assert_eq!(third.correct_answer, "C");
        assert_eq!(third.correct_text.as_deref(), Some("a book"));
        assert_eq!(third.explanation, "Books are for reading.");
        assert!(outcome.results[3].user_answer.is_none());
    }

    #[test]
    fn test_question_without_label_never_matches() {
        let questions = parse_quiz("Q: Broken?\nA) x\nB) y").unwrap();

        let outcome = grade(&questions, &answers(&[("q0", "")]));
        assert_eq!(outcome.total_correct, 0);
        assert!(!outcome.results[0].is_correct);
        assert_eq!(outcome.results[0].correct_text, None);
    }

    #[test]
    fn test_score_percentage() {
        assert_eq!(score_percentage(0, 0), 0.0);
        assert_eq!(score_percentage(3, 4), 75.0);
        assert!((score_percentage(1, 3) - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_stash_overwrites_per_key() {
        let stash = QuizStash::new(None);

        stash.stash("token-a", questions(), vec!["apple".into()]);
        stash.stash("token-b", Vec::new(), vec!["bed".into()]);
        stash.stash("token-a", questions()[..1].to_vec(), vec!["book".into()]);

        let a = stash.get("token-a").expect("entry for token-a");
        assert_eq!(a.questions.len(), 1);
        assert_eq!(a.words, vec!["book"]);
        assert_eq!(stash.len(), 2);

        stash.clear("token-a");
        assert!(stash.get("token-a").is_none());
        assert!(stash.get("token-b").is_some());
    }

    #[test]
    fn test_stash_expires_after_ttl() {
        let stash = QuizStash::new(Some(Duration::minutes(10)));
        stash.stash("token", questions(), vec!["apple".into()]);

        let now = Utc::now();
        assert!(stash.get_at("token", now + Duration::minutes(9)).is_some());
        assert!(stash.get_at("token", now + Duration::minutes(11)).is_none());
        assert!(stash.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let stash = QuizStash::new(Some(Duration::minutes(10)));
        stash.stash("old", questions(), vec!["apple".into()]);

        let later = Utc::now() + Duration::minutes(30);
        assert_eq!(stash.purge_expired_at(later), 1);
        assert!(stash.is_empty());

        let forever = QuizStash::new(None);
        forever.stash("kept", questions(), vec!["apple".into()]);
        assert_eq!(forever.purge_expired_at(later), 0);
        assert_eq!(forever.len(), 1);
    }
}
