//! Prompt text and response schemas for each generation call.
//!
//! Schemas use the Gemini `Type` vocabulary (`ARRAY`, `OBJECT`, `STRING`).

use crate::core::config::Language;
use crate::core::state::{BookSettings, OutlineItem};
use crate::utils::text::format_duration;
use serde_json::{json, Value};

fn reply_in(language: Language) -> &'static str {
    match language {
        Language::Vi => "Trả lời bằng tiếng Việt.",
        Language::En => "Respond in English.",
    }
}

fn idea_clause(book: &BookSettings) -> String {
    let idea = book.idea.trim();
    if idea.is_empty() {
        return String::new();
    }
    match book.language {
        Language::Vi => format!(" Ý tưởng/bối cảnh bổ sung: \"{}\".", idea),
        Language::En => format!(" Additional idea/context: \"{}\".", idea),
    }
}

pub fn outline(book: &BookSettings) -> String {
    let body = match book.language {
        Language::Vi => format!(
            "Dựa trên tên sách \"{}\", hãy tạo dàn ý kịch bản cho một video YouTube phong cách audiobook \
            dài {} phút, với khoảng {} chương nội dung chính.{} \
            Cấu trúc gồm: Hook mở đầu, Giới thiệu kèm góc nhìn người dẫn chuyện, các chương chính, \
            Kế hoạch hành động 7 ngày, Tóm tắt 3 ý chính và Lời kêu gọi hành động. \
            Mỗi mục cần có 'title', 'focus' (nội dung chính) và 3-4 'actions' (các điểm cần nói).",
            book.title, book.duration_min, book.chapters_count, idea_clause(book)
        ),
        Language::En => format!(
            "Based on the book \"{}\", create a script outline for an audiobook-style YouTube video \
            lasting {} minutes, with about {} main chapters.{} \
            Structure: opening Hook, Intro with the narrator's point of view, the main chapters, \
            a 7-day action plan, a 3-point summary and a call to action. \
            Each item needs a 'title', a 'focus' (what the section covers) and 3-4 'actions' (talking points).",
            book.title, book.duration_min, book.chapters_count, idea_clause(book)
        ),
    };
    format!("{} {}", body, reply_in(book.language))
}

pub fn outline_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "focus": { "type": "STRING" },
                "actions": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["title", "focus", "actions"]
        }
    })
}

pub fn story_block(item: &OutlineItem, book: &BookSettings, target_chars: u64) -> String {
    let body = match book.language {
        Language::Vi => format!(
            "Bạn là một nhà văn. Hãy viết nội dung truyện cho chương \"{}\" của tác phẩm \"{}\".{} \
            Trọng tâm của chương: \"{}\". Các tình tiết cần có: {}. \
            Độ dài khoảng {} ký tự. Viết văn xuôi liền mạch, không dùng tiêu đề hay gạch đầu dòng.",
            item.title,
            book.title,
            idea_clause(book),
            item.focus,
            item.actions.join(", "),
            target_chars
        ),
        Language::En => format!(
            "You are a novelist. Write the story text for the chapter \"{}\" of \"{}\".{} \
            Chapter focus: \"{}\". Beats to include: {}. \
            Length about {} characters. Write continuous prose with no headings or bullet points.",
            item.title,
            book.title,
            idea_clause(book),
            item.focus,
            item.actions.join(", "),
            target_chars
        ),
    };
    format!("{} {}", body, reply_in(book.language))
}

pub fn review_block(content: &str, chapter: &str, book: &BookSettings) -> String {
    let body = match book.language {
        Language::Vi => format!(
            "Bạn là người dẫn chuyện của một kênh audiobook review. Giọng văn tự nhiên, \
            đàm thoại, có góc nhìn cá nhân. Hãy viết kịch bản review cho phần \"{}\" \
            của cuốn sách \"{}\" dựa trên nội dung sau, phù hợp để thu âm:\n\n{}",
            chapter, book.title, content
        ),
        Language::En => format!(
            "You narrate an audiobook review channel in a natural, conversational voice \
            with a personal point of view. Write the review script for the part \"{}\" \
            of the book \"{}\" based on the following text, ready for recording:\n\n{}",
            chapter, book.title, content
        ),
    };
    format!("{}\n\n{}", body, reply_in(book.language))
}

pub fn seo(book: &BookSettings) -> String {
    let body = match book.language {
        Language::Vi => format!(
            "Tạo nội dung SEO cho một video YouTube về cuốn sách \"{}\", \
            dạng phân tích phong cách audiobook dài {} phút. Hãy cung cấp: 8 tiêu đề hấp dẫn, \
            danh sách hashtag liên quan, danh sách từ khóa và một đoạn mô tả video.",
            book.title, book.duration_min
        ),
        Language::En => format!(
            "Create SEO content for a YouTube video about the book \"{}\", \
            an audiobook-style breakdown lasting {} minutes. Provide: 8 compelling titles, \
            a list of relevant hashtags, a list of keywords and a video description.",
            book.title, book.duration_min
        ),
    };
    format!("{} {}", body, reply_in(book.language))
}

pub fn seo_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "titles": { "type": "ARRAY", "items": { "type": "STRING" } },
            "hashtags": { "type": "ARRAY", "items": { "type": "STRING" } },
            "keywords": { "type": "ARRAY", "items": { "type": "STRING" } },
            "description": { "type": "STRING" }
        },
        "required": ["titles", "hashtags", "keywords", "description"]
    })
}

/// Video prompts are always requested in English for image/video models.
pub fn video_prompts(book: &BookSettings) -> String {
    format!(
        "Generate 5 cinematic, photorealistic video prompts for background visuals in a YouTube video \
        about the book \"{}\". Draw on the book's main themes. Each prompt MUST target the aspect \
        ratio {}. Keep the style beautiful, subtle and non-distracting, with no text or logos. \
        Respond with a JSON array of strings.",
        book.title, book.frame_ratio
    )
}

pub fn thumbnail_ideas(book: &BookSettings) -> String {
    let duration = format_duration(book.duration_min);
    let body = match book.language {
        Language::Vi => format!(
            "Cho một video YouTube về cuốn sách \"{}\", hãy đề xuất 5 ý tưởng văn bản ngắn, \
            có sức hút cho thumbnail. Một ý tưởng phải chứa thời lượng: {}.",
            book.title, duration
        ),
        Language::En => format!(
            "For a YouTube video about the book \"{}\", suggest 5 short, punchy thumbnail text ideas. \
            One idea must include the duration: {}.",
            book.title, duration
        ),
    };
    format!("{} {}", body, reply_in(book.language))
}

pub fn string_list_schema() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}
