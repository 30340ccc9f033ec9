//! HTML rendering of the food waste report.
//!
//! [`render_report`] is a pure function: the language, logo and report date
//! are passed in explicitly through [`RenderOptions`], so identical inputs
//! always produce identical markup.  The document is self-contained (inline
//! CSS, logo embedded as a data URL) so it can be rasterized without network
//! access.

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};

use crate::locale::{Language, TextDirection};
use crate::model::{
    ReportData, SelectedSections, SECTION_RECOMMENDATIONS, SECTION_RETURNS, SECTION_SUMMARY,
};

/// Inputs of the renderer besides the report data itself.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    /// Language of labels and document direction.
    pub language: Language,
    /// Logo as a `data:` URL, omitted from the header when `None`.
    pub logo: Option<String>,
    /// Date printed in the header; its year is used in the footer.
    pub generated_on: NaiveDate,
}

impl RenderOptions {
    /// Creates options for the given language and date without a logo.
    pub fn new(language: impl Into<Language>, generated_on: NaiveDate) -> Self {
        Self {
            language: language.into(),
            logo: None,
            generated_on,
        }
    }

    /// Sets the embedded logo and returns the updated options.
    pub fn with_logo(mut self, logo: impl Into<Option<String>>) -> Self {
        self.logo = logo.into();
        self
    }
}

/// Renders the complete report document.
pub fn render_report(
    data: &ReportData,
    sections: &SelectedSections,
    options: &RenderOptions,
) -> String {
    let lang = &options.language;
    let dir = lang.direction();

    let mut html = String::with_capacity(16 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html dir=\"{dir}\" lang=\"{code}\">\n<head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{title}</title>\n<style>\n{css}</style>\n</head>\n<body>\n",
        dir = dir.as_str(),
        code = escape(lang.code()),
        title = lang.pick("تقرير شامل", "Comprehensive Report"),
        css = stylesheet(dir),
    );

    push_header(&mut html, data, options);

    if sections.includes(SECTION_SUMMARY) {
        push_summary(&mut html, data, lang);
    }
    if sections.includes(SECTION_RETURNS) {
        push_returns(&mut html, data, lang);
    }
    if sections.includes(SECTION_RECOMMENDATIONS) {
        push_recommendations(&mut html, data, lang);
    }

    let _ = write!(
        html,
        "<div class=\"footer\">\n<p>&copy; {year} {system}</p>\n</div>\n</body>\n</html>\n",
        year = options.generated_on.year(),
        system = lang.pick("نظام تقليل هدر الطعام", "Food Waste Reduction System"),
    );

    html
}

fn push_header(html: &mut String, data: &ReportData, options: &RenderOptions) {
    let lang = &options.language;
    html.push_str("<div class=\"header\">\n");
    if let Some(logo) = options.logo.as_deref().filter(|logo| !logo.is_empty()) {
        let _ = writeln!(
            html,
            "<img src=\"{}\" alt=\"Logo\" class=\"logo\" />",
            escape(logo)
        );
    }
    let _ = write!(
        html,
        "<div class=\"header-text\">\n<h1 class=\"main-title\">{title}</h1>\n\
         <p class=\"subtitle\">{period_label} {period} | {date_label} {date}</p>\n</div>\n</div>\n",
        title = lang.pick(
            "تقرير شامل لتقليل هدر الطعام",
            "Comprehensive Report - Food Waste Reduction"
        ),
        period_label = lang.pick("الفترة:", "Period:"),
        period = escape(&lang.period_label(&data.selected_period)),
        date_label = lang.pick("تاريخ التقرير:", "Report Date:"),
        date = lang.format_date(options.generated_on),
    );
}

fn push_section_open(html: &mut String, name: &str, title: &str) {
    let _ = writeln!(
        html,
        "<div class=\"section\" data-section=\"{name}\">\n<h2 class=\"section-title\">{title}</h2>"
    );
}

fn push_summary(html: &mut String, data: &ReportData, lang: &Language) {
    let stats = data.general_stats;
    push_section_open(
        html,
        SECTION_SUMMARY,
        lang.pick("الإحصائيات العامة", "General Statistics"),
    );
    html.push_str("<div class=\"stats-grid\">\n");
    push_stat(
        html,
        lang.pick("إجمالي الهدر", "Total Waste"),
        &format!(
            "{} {}",
            lang.format_number(stats.total_waste.unwrap_or(0.0)),
            lang.pick("كجم", "kg")
        ),
    );
    push_stat(
        html,
        lang.pick("المرتجعات المتوقعة", "Expected Returns"),
        &lang.format_number(stats.total_returns.unwrap_or(0.0)),
    );
    html.push_str("</div>\n</div>\n");
}

fn push_stat(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<div class=\"stat-item\">\n<div class=\"stat-label\">{}</div>\n<div class=\"stat-value\">{}</div>\n</div>",
        label,
        escape(value)
    );
}

fn push_returns(html: &mut String, data: &ReportData, lang: &Language) {
    push_section_open(html, SECTION_RETURNS, lang.pick("المرتجعات", "Returns"));
    let _ = writeln!(
        html,
        "<table>\n<thead><tr><th>{}</th><th>{}</th><th>{}</th><th>{}</th><th>{}</th></tr></thead>\n<tbody>",
        lang.pick("رقم المرتجع", "Return #"),
        lang.pick("التاريخ", "Date"),
        lang.pick("العميل / المورد", "Customer / Supplier"),
        lang.pick("الحالة", "Status"),
        lang.pick("القيمة", "Value"),
    );

    if data.returns.is_empty() {
        let _ = writeln!(
            html,
            "<tr><td colspan=\"5\">{}</td></tr>",
            lang.pick("لا توجد بيانات", "No data")
        );
    }

    for record in &data.returns {
        let party = record
            .customer
            .as_deref()
            .or(record.supplier.as_deref())
            .unwrap_or("-");
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&record.return_number),
            escape(record.date.as_deref().unwrap_or("")),
            escape(party),
            escape(record.display_status()),
            lang.format_number(record.total_value),
        );
    }

    html.push_str("</tbody>\n</table>\n</div>\n");
}

fn push_recommendations(html: &mut String, data: &ReportData, lang: &Language) {
    push_section_open(
        html,
        SECTION_RECOMMENDATIONS,
        lang.pick("توصيات الذكاء الاصطناعي", "AI Recommendations"),
    );
    html.push_str("<ul class=\"data-list\">\n");

    if data.recommendations.is_empty() {
        let _ = writeln!(
            html,
            "<li class=\"data-item\">{}</li>",
            lang.pick("لا توجد توصيات", "No recommendations")
        );
    }

    let arabic = lang.is_arabic();
    for rec in &data.recommendations {
        let _ = write!(
            html,
            "<li class=\"data-item\">\n<strong>{}</strong> <span class=\"priority\">{}</span>\n<p>{}</p>\n",
            escape(rec.localized_title(arabic)),
            escape(&rec.priority),
            escape(rec.localized_description(arabic)),
        );
        if let Some(savings) = rec.positive_savings() {
            let _ = writeln!(
                html,
                "<p class=\"savings\">{} ${}</p>",
                lang.pick("توفير متوقع:", "Expected Savings:"),
                lang.format_number(savings)
            );
        }
        html.push_str("</li>\n");
    }

    html.push_str("</ul>\n</div>\n");
}

/// Escapes text for use in element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn stylesheet(dir: TextDirection) -> String {
    let direction = dir.as_str();
    let align = dir.text_align();
    format!(
        r#"@font-face {{
  font-family: 'Cairo';
  font-style: normal;
  font-weight: 400;
  font-display: swap;
  src: local('Cairo'), local('Cairo-Regular'), local('Segoe UI'), local('Tahoma'), local('Arial Unicode MS');
}}
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{
  font-family: 'Cairo', 'Segoe UI', 'Tahoma', 'Arial Unicode MS', 'Arial', sans-serif;
  padding: 5mm;
  background: #ffffff;
  color: #053F5C;
  line-height: 1.5;
  -webkit-font-smoothing: antialiased;
  text-rendering: optimizeLegibility;
  direction: {direction};
  text-align: {align};
  width: 200mm;
  min-height: 287mm;
}}
.header {{
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
  margin-bottom: 8mm;
  padding: 8mm 5mm;
  background: linear-gradient(135deg, #053F5C 0%, #429EBD 100%);
  border-radius: 8px;
  min-height: 25mm;
}}
.logo {{ max-width: 45mm; max-height: 22mm; object-fit: contain; margin-bottom: 4mm; }}
.header-text {{ text-align: center; width: 100%; }}
.main-title {{
  font-size: 20px;
  font-weight: 700;
  color: #ffffff;
  margin-bottom: 3mm;
  line-height: 1.3;
  padding: 0 3mm;
  direction: {direction};
}}
.subtitle {{
  font-size: 11px;
  color: rgba(255, 255, 255, 0.95);
  font-weight: 500;
  background: rgba(255, 255, 255, 0.15);
  padding: 2mm 4mm;
  border-radius: 15px;
  display: inline-block;
  margin-top: 2mm;
}}
.section {{
  margin-bottom: 6mm;
  page-break-inside: avoid;
  padding: 5mm;
  border-radius: 6px;
  border: 1px solid rgba(66, 158, 189, 0.1);
}}
.section-title {{
  font-size: 16px;
  font-weight: 700;
  margin-bottom: 4mm;
  padding-bottom: 2mm;
  border-bottom: 2px solid #429EBD;
  direction: {direction};
  text-align: {align};
}}
.stats-grid {{ display: grid; grid-template-columns: repeat(2, 1fr); gap: 4mm; margin-bottom: 4mm; }}
.stat-item {{
  background: linear-gradient(135deg, #F0FAFC 0%, #E8F4F8 100%);
  padding: 4mm;
  border-radius: 5px;
  border: 1.5px solid rgba(66, 158, 189, 0.2);
}}
.stat-label {{ font-size: 10px; color: #666; margin-bottom: 2mm; font-weight: 600; text-transform: uppercase; }}
.stat-value {{ font-size: 18px; font-weight: 700; line-height: 1.2; }}
.data-list {{ list-style: none; }}
.data-item {{
  padding: 3mm 4mm;
  margin-bottom: 2mm;
  background: #F0FAFC;
  border-radius: 4px;
  font-size: 11px;
  border: 1px solid rgba(66, 158, 189, 0.15);
}}
.priority {{ font-size: 9px; color: #429EBD; }}
.savings {{ color: #2e7d32; font-weight: 600; }}
table {{
  width: 100%;
  border-collapse: separate;
  border-spacing: 0;
  margin-bottom: 4mm;
  font-size: 10px;
  direction: {direction};
}}
th {{
  background: linear-gradient(135deg, #429EBD 0%, #053F5C 100%);
  color: white;
  padding: 3mm 2.5mm;
  text-align: {align};
  direction: {direction};
}}
td {{
  padding: 2.5mm;
  border-bottom: 1px solid rgba(66, 158, 189, 0.1);
  font-size: 9px;
  text-align: {align};
  direction: {direction};
}}
tr:nth-child(even) td {{ background: #F0FAFC; }}
.footer {{
  margin-top: 8mm;
  padding: 4mm;
  background: linear-gradient(135deg, #F0FAFC 0%, #E8F4F8 100%);
  border-radius: 5px;
  text-align: center;
  font-size: 9px;
  color: #666;
  border-top: 2px solid #429EBD;
}}
"#
    )
}
