//! Chat payloads. Telegram HTML parse mode; all dynamic text is escaped.

use chrono::{DateTime, Utc};

use crate::ingest::normalize_title;
use crate::ingest::types::Article;

pub const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn format_published_at(ts: &DateTime<Utc>) -> String {
    ts.format(DATE_FORMAT).to_string()
}

fn esc(s: &str) -> String {
    html_escape::encode_text(&normalize_title(s)).to_string()
}

fn esc_attr(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).to_string()
}

/// Full notification used by scheduled runs.
pub fn scheduled_message(article: &Article, title: &str) -> String {
    format!(
        "📰 <b>{}</b>\n🔗 <i>Источник: {}</i>\n📆 <i>Дата: {}</i>\n<a href=\"{}\">Читать оригинал</a>",
        esc(title),
        esc(&article.source_name),
        format_published_at(&article.published_at),
        esc_attr(&article.url),
    )
}

/// Short notification used by `/latest`.
pub fn on_demand_message(article: &Article, title: &str) -> String {
    format!(
        "📰 <b>{}</b>\n<a href=\"{}\">Читать статью</a>",
        esc(title),
        esc_attr(&article.url),
    )
}

pub fn activated_message(interval_secs: u64) -> String {
    let minutes = (interval_secs / 60).max(1);
    format!(
        "🔔 Бот активирован! Новости будут приходить каждые {minutes} минут.\n\
         Используйте /latest для мгновенного получения новостей."
    )
}

pub const NO_NEWS_FOUND: &str = "😔 Новости не найдены";
pub const NOTHING_NEW: &str = "🔄 Новых новостей нет";
pub const FETCH_ERROR: &str = "⚠️ Ошибка при получении новостей";

pub fn sent_summary(n: usize) -> String {
    format!("✅ Отправлено новых новостей: {n}")
}

pub const HELP: &str = "/start — подписаться на новости\n/latest — последние новости сейчас\n/help — эта справка";
