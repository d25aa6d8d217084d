//! VETO 키워드 스캐너와 간이 감성 점수.
//!
//! 악재성 키워드가 최근 뉴스/토론방 텍스트에 하나라도 나타나면 해당
//! 종목은 점수와 무관하게 즉시 제외됩니다. VETO 발동 후 재검토는
//! 없습니다. 키워드가 없을 때만 키워드 기반 간이 감성 점수를 냅니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use closebet_core::{NewsItem, PartialScore, PhaseSignals, ScorePhase, SentimentSignals};

/// VETO 카테고리별 키워드 테이블.
const VETO_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "corporate_risk",
        &[
            "감사의견",
            "감사의견거절",
            "한정의견",
            "횡령",
            "배임",
            "분식회계",
            "상장폐지",
            "상폐",
            "관리종목",
            "거래정지",
            "매매정지",
        ],
    ),
    (
        "dilution_risk",
        &[
            "유상증자",
            "유증",
            "전환사채",
            "CB발행",
            "CB 발행",
            "신주인수권부사채",
            "BW발행",
            "BW 발행",
            "무상감자",
        ],
    ),
    ("short_risk", &["공매도", "대차잔고 급증", "공매도 급증"]),
    (
        "earnings_risk",
        &["적자전환", "적자확대", "매출급감", "실적쇼크", "어닝쇼크"],
    ),
    (
        "regulatory_risk",
        &[
            "검찰수사",
            "압수수색",
            "과징금",
            "제재",
            "FDA 반려",
            "임상실패",
            "임상 실패",
        ],
    ),
    (
        "insider_risk",
        &[
            "대주주 매도",
            "최대주주 변경",
            "최대주주 매도",
            "지분매각",
            "블록딜",
        ],
    ),
];

/// 감성 가점 키워드.
const POSITIVE_KEYWORDS: &[&str] = &[
    "수주", "흑자", "상향", "최대", "신고가", "돌파", "호실적", "성장", "확대", "개선",
    "급등", "강세", "기대", "전망", "승인", "계약",
];

/// 감성 감점 키워드 (VETO 수준은 아닌 약한 악재).
const NEGATIVE_KEYWORDS: &[&str] = &[
    "적자", "하락", "급락", "부진", "악재", "하향", "위기", "우려", "리스크", "폭락",
    "감소", "철회", "실패", "손실",
];

/// VETO 발견 원문 제목 보존 한도.
const MAX_SOURCE_TITLES: usize = 5;

/// VETO 스캔 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct VetoVerdict {
    /// VETO 발동 여부 (절대 거부)
    pub vetoed: bool,
    /// 감성 단계 부분 점수
    pub partial: PartialScore,
}

/// VETO 키워드 스캐너.
#[derive(Debug, Clone, Default)]
pub struct VetoScanner;

impl VetoScanner {
    pub fn new() -> Self {
        Self
    }

    /// 뉴스/토론방 항목을 스캔합니다.
    ///
    /// VETO 키워드 적중 시 `vetoed = true`에 점수 0. 적중이 없으면
    /// 기준 50점에 긍정 키워드 적중당 +10, 부정 적중당 -10을 더해
    /// [0, 100]으로 클램핑합니다.
    pub fn scan(&self, symbol: &str, name: &str, items: &[NewsItem]) -> VetoVerdict {
        let mut veto_keywords: Vec<String> = Vec::new();
        let mut veto_categories: Vec<String> = Vec::new();
        let mut source_titles: Vec<String> = Vec::new();
        let mut positive_hits = 0usize;
        let mut negative_hits = 0usize;

        for item in items {
            let text = item.combined_text();

            let mut item_vetoed = false;
            for (category, keywords) in VETO_KEYWORDS {
                for keyword in *keywords {
                    if text.contains(keyword) {
                        item_vetoed = true;
                        if !veto_keywords.iter().any(|k| k == keyword) {
                            veto_keywords.push((*keyword).to_string());
                        }
                        if !veto_categories.iter().any(|c| c == category) {
                            veto_categories.push((*category).to_string());
                        }
                    }
                }
            }
            if item_vetoed && source_titles.len() < MAX_SOURCE_TITLES {
                source_titles.push(item.title.clone());
            }

            // 항목당 카운트는 키워드 수가 아니라 항목 수 기준
            if POSITIVE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
                positive_hits += 1;
            }
            if NEGATIVE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
                negative_hits += 1;
            }
        }

        let vetoed = !veto_keywords.is_empty();
        if vetoed {
            warn!(
                symbol,
                name,
                keywords = ?veto_keywords,
                categories = ?veto_categories,
                "VETO 발동"
            );
        } else {
            info!(symbol, name, scanned = items.len(), "VETO 통과");
        }

        let value = if vetoed {
            Decimal::ZERO
        } else {
            dec!(50) + dec!(10) * Decimal::from(positive_hits as u64)
                - dec!(10) * Decimal::from(negative_hits as u64)
        };

        let signals = PhaseSignals::Sentiment(SentimentSignals {
            scanned_items: items.len(),
            positive_hits,
            negative_hits,
            veto_keywords,
            veto_categories,
            source_titles,
        });

        VetoVerdict {
            vetoed,
            partial: PartialScore::new(ScorePhase::Sentiment, value, signals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            content: String::new(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn single_veto_keyword_rejects_unconditionally() {
        let scanner = VetoScanner::new();
        let items = vec![
            item("신규 수주 계약 체결, 호실적 전망"),
            item("유상증자 결정 공시"),
        ];

        let verdict = scanner.scan("005930", "삼성전자", &items);
        assert!(verdict.vetoed);
        assert_eq!(verdict.partial.value, Decimal::ZERO);

        match &verdict.partial.signals {
            PhaseSignals::Sentiment(s) => {
                assert_eq!(s.veto_keywords, vec!["유상증자".to_string()]);
                assert_eq!(s.veto_categories, vec!["dilution_risk".to_string()]);
                assert_eq!(s.source_titles, vec!["유상증자 결정 공시".to_string()]);
            }
            other => panic!("unexpected signals: {:?}", other),
        }
    }

    #[test]
    fn no_hits_yields_neutral_base_score() {
        let scanner = VetoScanner::new();
        let items = vec![item("시황 코멘트"), item("거래 동향 정리")];

        let verdict = scanner.scan("005930", "삼성전자", &items);
        assert!(!verdict.vetoed);
        assert_eq!(verdict.partial.value, dec!(50));
    }

    #[test]
    fn sentiment_moves_with_keyword_hits() {
        let scanner = VetoScanner::new();
        let items = vec![
            item("대규모 수주 확보"),
            item("실적 개선 기대"),
            item("단기 하락 우려"),
        ];

        // 50 + 10*2 - 10*1 = 60
        let verdict = scanner.scan("005930", "삼성전자", &items);
        assert!(!verdict.vetoed);
        assert_eq!(verdict.partial.value, dec!(60));
    }

    #[test]
    fn sentiment_is_clamped_to_valid_range() {
        let scanner = VetoScanner::new();
        let items: Vec<NewsItem> = (0..8).map(|_| item("단기 하락 우려")).collect();

        let verdict = scanner.scan("005930", "삼성전자", &items);
        assert_eq!(verdict.partial.value, Decimal::ZERO);
    }

    #[test]
    fn empty_news_is_neutral_not_veto() {
        let scanner = VetoScanner::new();
        let verdict = scanner.scan("005930", "삼성전자", &[]);
        assert!(!verdict.vetoed);
        assert_eq!(verdict.partial.value, dec!(50));
    }
}
