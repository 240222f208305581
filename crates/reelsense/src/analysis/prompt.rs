//! Prompts sent to the language model.

/// Instruction paired with the cover image for text extraction.
pub const COVER_TEXT_INSTRUCTION: &str = "convert to markdown";

/// Builds the sentiment analysis prompt around the combined video text.
pub fn sentiment_prompt(content: &str) -> String {
    format!(
        r#"You are an experienced public opinion analyst. The text below was extracted from a short video: the words shown on its cover image and, when available, a transcript of its audio. Analyse it for public opinion monitoring.

**Content:**
{content}

---

Reply with a single JSON object and nothing else, shaped exactly like this:

{{
  "sentiment_score": 0.75,
  "sentiment_label": "positive",
  "key_topics": ["topic 1", "topic 2", "topic 3"],
  "risk_level": "low",
  "detailed_analysis": "...",
  "recommendations": ["recommendation 1", "recommendation 2"]
}}

**Fields:**

1. sentiment_score: number from 0.0 to 1.0. 0.0 is extremely negative, 0.3 negative, 0.5 neutral, 0.7 positive, 1.0 extremely positive. Weigh word choice, tone and how sensitive the subject is.
2. sentiment_label: one of "positive" (score > 0.6), "neutral" (0.4 to 0.6 inclusive) or "negative" (score < 0.4).
3. key_topics: 3 to 5 short keywords naming the people, events, industries or points of controversy involved.
4. risk_level: one of "low", "medium" or "high".
   - high: major negative events, scandals involving public figures or socially sensitive subjects likely to draw wide attention.
   - medium: controversial content or some negative voices with limited reach.
   - low: positive or neutral content with no evident risk.
5. detailed_analysis: 150 to 300 words covering a summary of the video, the reasoning behind the score, the likely public reaction and the potential impact on the parties involved. Keep it professional and objective.
6. recommendations: 2 to 4 concrete actions for the creator, the people concerned or the monitoring team (content changes, risk responses, communication strategy, points to keep watching).

Consider the cover text and the audio together. When they disagree, judge the video as a whole."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_content_and_schema() {
        let prompt = sentiment_prompt("Cover text:\nSALE 50% OFF");
        assert!(prompt.contains("Cover text:\nSALE 50% OFF"));
        assert!(prompt.contains("\"sentiment_score\": 0.75"));
        assert!(prompt.contains("\"recommendations\""));
        assert!(!prompt.contains("{{"));
    }
}
