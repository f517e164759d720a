//! Time-of-day menu recommendations.
//!
//! Pure function of the current hour and season; no remote call is made for
//! the `recommend` action.

use crate::menu::Temperature;
use crate::nlu::prompt::{MealTime, Season, TimeContext};
use serde::Serialize;

/// One recommendation entry presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub name: String,
    pub reason: String,
    /// `None` for desserts.
    pub temperature: Option<Temperature>,
}

fn rec(name: &str, reason: &str, temperature: Option<Temperature>) -> Recommendation {
    Recommendation {
        name: name.to_owned(),
        reason: reason.to_owned(),
        temperature,
    }
}

/// Suggestions for the given moment. In summer every drink suggestion is
/// flipped to iced.
pub fn recommendations(time: &TimeContext) -> Vec<Recommendation> {
    let mut recs = match time.meal_time() {
        MealTime::Breakfast => vec![
            rec("아메리카노", "상쾌한 아침을 위한 클래식 선택", Some(Temperature::Hot)),
            rec("카페라떼", "부드러운 아침 시작", Some(Temperature::Hot)),
        ],
        MealTime::Lunch => vec![
            rec("아메리카노", "식사 후 깔끔한 마무리", Some(Temperature::Hot)),
            rec("초코라떼", "달콤한 디저트 음료", Some(Temperature::Hot)),
        ],
        MealTime::Dinner => vec![
            rec("밀크티", "저녁에 부담없는 음료", Some(Temperature::Hot)),
            rec("치즈케이크", "하루를 마무리하는 달콤함", None),
        ],
    };

    if time.season() == Season::Summer {
        for entry in &mut recs {
            if entry.temperature.is_some() {
                entry.temperature = Some(Temperature::Iced);
            }
        }
    }

    recs
}

/// Short spoken summary of the recommendation names.
pub fn spoken_summary(recs: &[Recommendation]) -> String {
    if recs.is_empty() {
        return "지금은 추천드릴 메뉴가 없습니다.".to_owned();
    }
    let names: Vec<&str> = recs.iter().map(|r| r.name.as_str()).collect();
    format!("{} 어떠세요?", names.join("나 "))
}
