//! Time-of-day context and classifier prompt construction.

use crate::intent::QuickIntent;
use crate::menu::Menu;
use crate::session::{ContextSnapshot, Role, SessionState, Turn};
use chrono::{Datelike, Local, Timelike};

/// Season derived from the calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    fn korean(self) -> &'static str {
        match self {
            Self::Spring => "봄",
            Self::Summer => "여름",
            Self::Autumn => "가을",
            Self::Winter => "겨울",
        }
    }
}

/// Meal slot derived from the hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealTime {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealTime {
    fn korean(self) -> &'static str {
        match self {
            Self::Breakfast => "아침",
            Self::Lunch => "점심",
            Self::Dinner => "저녁",
        }
    }
}

/// Wall-clock context embedded in the prompt and used for seasonal defaults
/// and recommendations. Pure data so tests can pin a moment in time.
#[derive(Debug, Clone, Copy)]
pub struct TimeContext {
    pub hour: u32,
    pub month: u32,
    /// Monday = 1 ... Sunday = 7.
    pub weekday: u32,
}

impl TimeContext {
    /// Capture the current local time.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            hour: now.hour(),
            month: now.month(),
            weekday: now.weekday().number_from_monday(),
        }
    }

    pub fn season(&self) -> Season {
        match self.month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn meal_time(&self) -> MealTime {
        match self.hour {
            12..=16 => MealTime::Lunch,
            17.. => MealTime::Dinner,
            _ => MealTime::Breakfast,
        }
    }

    /// Morning, lunch and evening rush windows.
    pub fn is_rush_hour(&self) -> bool {
        matches!(self.hour, 7..=9 | 12..=13 | 18..=19)
    }

    pub fn is_weekend(&self) -> bool {
        self.weekday >= 6
    }

    fn period_korean(&self) -> &'static str {
        match self.hour {
            12..=16 => "오후",
            17.. => "저녁",
            _ => "오전",
        }
    }
}

/// Format the bounded conversation history for the prompt.
fn format_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "고객",
                Role::Assistant => "AI",
            };
            format!("{speaker}: {}", turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full classifier prompt: persona, time context, menu, session
/// context, history, cart and pending-order snapshots, response rules and
/// the required JSON shape, followed by the quoted utterance and the local
/// quick-intent hint.
pub fn build_prompt(
    menu: &Menu,
    time: &TimeContext,
    snapshot: &ContextSnapshot,
    history: &[Turn],
    utterance: &str,
    quick_intent: Option<QuickIntent>,
) -> String {
    let mut prompt = String::with_capacity(2_048);

    prompt.push_str("당신은 스마트 카페 키오스크 AI입니다.\n현재 상황:\n");
    prompt.push_str(&format!(
        "- 시간: {} {}시 ({}, {})\n",
        time.period_korean(),
        time.hour,
        time.meal_time().korean(),
        time.season().korean(),
    ));
    prompt.push_str(if time.is_rush_hour() {
        "- 혼잡 시간대\n"
    } else {
        "- 여유 시간대\n"
    });
    prompt.push_str(if time.is_weekend() { "- 주말\n" } else { "- 평일\n" });

    match snapshot.session_state {
        SessionState::Continuous => {
            prompt.push_str("현재 연속 주문 모드입니다. 빠르고 간결하게 응답하세요.\n");
        }
        SessionState::WaitingConfirm => {
            prompt.push_str("고객이 주문 확인을 기다리고 있습니다.\n");
        }
        _ => {}
    }

    prompt.push_str("\n메뉴 정보:\n");
    prompt.push_str(&menu.prompt_listing());
    prompt.push_str(
        "\n\n옵션: small(-500), medium(기본), large(+500) / hot, iced / \
         샷추가(+500), 시럽추가(+300), 휘핑추가(+500)\n",
    );

    if !history.is_empty() {
        prompt.push_str("\n대화 기록:\n");
        prompt.push_str(&format_history(history));
        prompt.push('\n');
    }

    if !snapshot.cart_items.is_empty() {
        let lines: Vec<String> = snapshot
            .cart_items
            .iter()
            .map(|item| format!("{} {}개", item.name, item.quantity))
            .collect();
        prompt.push_str(&format!("장바구니: {}\n", lines.join(", ")));
    }

    if !snapshot.pending_summaries.is_empty() {
        prompt.push_str(&format!(
            "대기 주문: {}\n",
            snapshot.pending_summaries.join(", ")
        ));
    }

    prompt.push_str(
        "\n상황별 응답 규칙:\n\
         1. 단순 긍정(\"네\", \"예\") → confirm 액션\n\
         2. 단순 부정(\"아니요\") → cancel 액션 (target: \"last\")\n\
         3. 전체 취소 요청 → cancel 액션 (target: \"all\")\n\
         4. 주문 완료/결제 요청 → complete 액션\n\
         5. 연속 주문 → autoConfirm: true 설정\n\
         6. 애매한 표현 → clarify 액션\n\
         7. 화면 이동 요청 → navigate 액션 (screen 지정)\n\
         \n응답 규칙:\n- 30자 이내로 간결하게\n",
    );
    prompt.push_str(if time.is_rush_hour() {
        "- 신속한 처리 우선\n"
    } else {
        "- 친절한 안내 우선\n"
    });
    prompt.push_str(
        "- 연속 주문시 빠른 확인 (autoConfirm: true)\n\
         - 추천시 시간대와 계절 고려\n\
         \nJSON 형식:\n\
         {\n  \"success\": true/false,\n\
         \x20 \"action\": \"order|confirm|cancel|modify|complete|clarify|recommend|navigate|error\",\n\
         \x20 \"items\": [{\"name\": \"메뉴명\", \"temperature\": \"hot|iced\", \"size\": \"small|medium|large\", \"quantity\": 수량, \"options\": [\"추가옵션\"], \"price\": 가격}],\n\
         \x20 \"totalPrice\": 총액,\n  \"response\": \"음성 응답\",\n\
         \x20 \"autoConfirm\": true/false,\n  \"target\": \"last|all\",\n\
         \x20 \"screen\": \"Cart|MenuList|Home\",\n  \"suggestions\": [\"추천1\", \"추천2\"]\n}\n",
    );

    prompt.push_str(&format!("\n고객: \"{utterance}\"\n"));
    if let Some(intent) = quick_intent {
        prompt.push_str(&format!("(감지된 의도: {intent})\n"));
    }
    prompt.push_str("\nJSON으로만 응답:");

    prompt
}
