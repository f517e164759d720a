//! Keyword-based fallback intent classifier.
//!
//! Pure and synchronous: maps lowercased utterance text against ordered
//! keyword sets and returns the first matching tag. Used both as a hint in
//! the gateway's prompt and as the emergency path when the remote classifier
//! is unavailable or unparsable. Deterministic, so it can be tested
//! exhaustively.

/// Coarse intent tag detected from raw utterance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickIntent {
    Confirm,
    Cancel,
    Modify,
    Complete,
    More,
    Recommend,
    Navigate,
}

impl std::fmt::Display for QuickIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
            Self::Modify => "modify",
            Self::Complete => "complete",
            Self::More => "more",
            Self::Recommend => "recommend",
            Self::Navigate => "navigate",
        };
        f.write_str(tag)
    }
}

/// (intent, keywords) in match priority order. Earlier entries win, so
/// "주문 취소" matches `Cancel` before `More` could see "추가".
const INTENT_TABLE: &[(QuickIntent, &[&str])] = &[
    (
        QuickIntent::Confirm,
        &["네", "예", "맞아", "맞습니다", "확인", "오케이", "ok", "좋아", "좋습니다"],
    ),
    (
        QuickIntent::Cancel,
        &["아니", "아니요", "취소", "안할래", "그만", "삭제", "빼", "빼주"],
    ),
    (QuickIntent::Modify, &["바꿔", "변경", "수정", "대신", "말고"]),
    (
        QuickIntent::Complete,
        &["끝", "완료", "결제", "계산", "마무리", "이제 그만"],
    ),
    (QuickIntent::More, &["더", "추가", "또", "그리고", "하나 더"]),
    (
        QuickIntent::Recommend,
        &["추천", "뭐가 좋", "뭐 먹을까", "메뉴 추천"],
    ),
    (
        QuickIntent::Navigate,
        &["보여줘", "화면", "메뉴판", "장바구니 보여"],
    ),
];

/// Detect a coarse intent from raw utterance text.
///
/// Returns the first table entry with any keyword contained in the
/// lowercased text, or `None` when nothing matches.
pub fn detect_intent(text: &str) -> Option<QuickIntent> {
    let lower = text.to_lowercase();
    for &(intent, keywords) in INTENT_TABLE {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return Some(intent);
        }
    }
    None
}
