//! Provider prompt composition.
//!
//! Jobs never build prompt text inline; they fill one of the `*Prompt`
//! structs and hand it to a [`PromptComposer`]. [`DefaultPrompts`] is the
//! stock wording.

use slidesmith_core::page_type::PageType;
use slidesmith_core::scope::InfographicMode;

/// Inputs for a page description.
#[derive(Debug, Clone, Copy)]
pub struct DescriptionPrompt<'a> {
    pub outline_text: &'a str,
    pub title: &'a str,
    pub points: &'a [String],
    /// 1-based page number.
    pub page_number: usize,
    pub total_pages: usize,
    pub page_type: PageType,
    pub extra_requirements: Option<&'a str>,
}

/// Inputs for a slide image.
#[derive(Debug, Clone, Copy)]
pub struct PageImagePrompt<'a> {
    pub description: &'a str,
    pub outline_text: &'a str,
    pub section: &'a str,
    pub page_type: PageType,
    pub aspect_ratio: &'a str,
    pub has_template: bool,
    pub has_material_images: bool,
    pub extra_requirements: Option<&'a str>,
    /// Textual style used when there is no template image.
    pub style: Option<&'a str>,
}

/// Inputs for one social card.
#[derive(Debug, Clone, Copy)]
pub struct CardPrompt<'a> {
    /// 0-based card index.
    pub index: usize,
    pub total: usize,
    pub role: PageType,
    pub title: &'a str,
    pub bullets: &'a [String],
    pub aspect_ratio: &'a str,
    pub has_template: bool,
    pub extra_requirements: Option<&'a str>,
    pub style: Option<&'a str>,
}

/// Inputs for an infographic content blueprint.
#[derive(Debug, Clone, Copy)]
pub struct BlueprintPrompt<'a> {
    pub mode: InfographicMode,
    pub outline_text: &'a str,
    pub descriptions: &'a str,
    pub page_title: Option<&'a str>,
    pub extra_requirements: Option<&'a str>,
    pub style: Option<&'a str>,
}

/// Builds every prompt the jobs send to providers.
pub trait PromptComposer: Send + Sync {
    fn description(&self, input: &DescriptionPrompt<'_>) -> String;
    fn page_image(&self, input: &PageImagePrompt<'_>) -> String;
    fn image_edit(&self, instruction: &str, original_description: Option<&str>) -> String;
    fn template_variant(&self, page_type: PageType) -> String;
    fn card_image(&self, input: &CardPrompt<'_>) -> String;
    fn infographic_blueprint(&self, input: &BlueprintPrompt<'_>) -> String;
    fn infographic_image(
        &self,
        blueprint: &str,
        mode: InfographicMode,
        page_title: Option<&str>,
        aspect_ratio: &str,
        style: Option<&str>,
    ) -> String;
    /// Expand a free-text style into an actionable style guide.
    fn style_refinement(&self, template_style: &str, extra_requirements: Option<&str>) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPrompts;

fn extra_section(extra: Option<&str>) -> String {
    match extra.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => format!("\nExtra requirements (must be followed):\n{extra}\n"),
        None => String::new(),
    }
}

fn style_section(style: Option<&str>) -> String {
    match style.map(str::trim).filter(|s| !s.is_empty()) {
        Some(style) => format!("\nStyle guide:\n{style}\n"),
        None => String::new(),
    }
}

fn page_type_brief(page_type: PageType) -> &'static str {
    match page_type {
        PageType::Cover => {
            "This is the cover page. Few words, strong hierarchy, generous whitespace; \
             the title is the largest element."
        }
        PageType::Transition => {
            "This is a section break. Minimal content, usually only the section title; \
             a clean visual pause between sections."
        }
        PageType::Content => {
            "This is a content page. Modular grid or card layout, consistent alignment, \
             readability first."
        }
        PageType::Ending => {
            "This is the closing page. Calm and memorable, echoing the cover's visual \
             language with more restraint."
        }
    }
}

fn variant_brief(page_type: PageType) -> &'static str {
    match page_type {
        PageType::Cover => {
            "Cover background: a clean focal area near the upper centre for a large title, \
             the richest decoration of the four variants, still orderly."
        }
        PageType::Transition => {
            "Section-break background: very few decorative elements, large negative space, \
             the lowest decoration density of the four variants."
        }
        PageType::Content => {
            "Content background: hint at a grid or card structure, decoration kept to the \
             edges, a clear safe area for body text."
        }
        PageType::Ending => {
            "Closing background: a stable composition anchored at the bottom or centre, \
             echoing the cover with calmer decoration."
        }
    }
}

impl PromptComposer for DefaultPrompts {
    fn description(&self, input: &DescriptionPrompt<'_>) -> String {
        let points = if input.points.is_empty() {
            "(none)".to_string()
        } else {
            input
                .points
                .iter()
                .map(|p| format!("- {p}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "You are writing the on-slide text of one page of a presentation.\n\n\
             Full outline:\n{outline}\n\n\
             Page {number} of {total} ({page_type}).\n\
             Title: {title}\n\
             Key points:\n{points}\n\n\
             Write the complete text that should appear on this page: a title line and \
             concise body text. Plain text only, no commentary.\n{extra}",
            outline = input.outline_text,
            number = input.page_number,
            total = input.total_pages,
            page_type = input.page_type,
            title = input.title,
            extra = extra_section(input.extra_requirements),
        )
    }

    fn page_image(&self, input: &PageImagePrompt<'_>) -> String {
        let style_rule = if input.has_template {
            "Match the colours and design language of the template image closely; never copy its text."
        } else {
            "Follow the style guide strictly."
        };
        let materials = if input.has_material_images {
            "\nAdditional material images are attached. Pick and integrate the elements that fit this page.\n"
        } else {
            ""
        };
        format!(
            "You are an expert presentation designer producing one finished slide.\n\n\
             <page_description>\n{description}\n</page_description>\n\n\
             <reference_information>\n\
             Context only, never render this text.\n\
             Outline:\n{outline}\n\
             Current section: {section}\n\
             </reference_information>\n\n\
             Constraints:\n\
             1) Aspect ratio {aspect}; crisp, legible text.\n\
             2) Render every word of <page_description>; add nothing, omit nothing.\n\
             3) No markdown symbols unless required.\n\
             4) {style_rule}\n\
             5) No headers, footers, page numbers or watermarks unless the description asks for them.\n\n\
             {brief}\n{materials}{style}{extra}",
            description = input.description,
            outline = input.outline_text,
            section = input.section,
            aspect = input.aspect_ratio,
            brief = page_type_brief(input.page_type),
            style = style_section(input.style),
            extra = extra_section(input.extra_requirements),
        )
    }

    fn image_edit(&self, instruction: &str, original_description: Option<&str>) -> String {
        match original_description.map(str::trim).filter(|d| !d.is_empty()) {
            Some(description) => format!(
                "The original description of this slide is:\n{description}\n\n\
                 Modify the slide according to this instruction: {instruction}\n\n\
                 Keep the existing text and design style; change only what the instruction asks. \
                 Any additional images are new material or regions the user marked."
            ),
            None => format!(
                "Modify this slide according to this instruction: {instruction}\n\
                 Keep the existing content structure and design style; change only what the \
                 instruction asks. Any additional images are new material or regions the user marked."
            ),
        }
    }

    fn template_variant(&self, page_type: PageType) -> String {
        format!(
            "You are a presentation template designer. Based on the overall style, palette and \
             visual language of the reference image, create a new slide background template.\n\
             - Background and decoration only: no text, logos, icons, people, charts or placeholder copy.\n\
             - Clean enough to lay content over, consistent in style and texture with the reference.\n\
             - Cover, content, transition and ending variants must differ in at least two of: \
             composition, whitespace ratio, decoration density, focal position.\n\
             - {brief}\n",
            brief = variant_brief(page_type),
        )
    }

    fn card_image(&self, input: &CardPrompt<'_>) -> String {
        let role = match input.role {
            PageType::Cover => "the cover card: one bold headline, eye-catching, minimal text",
            PageType::Ending => "the closing card: a short takeaway or call to action",
            _ => "a content card: a headline plus short, scannable points",
        };
        let bullets = input
            .bullets
            .iter()
            .map(|b| format!("- {b}"))
            .collect::<Vec<_>>()
            .join("\n");
        let style_rule = if input.has_template {
            "Follow the reference template's palette and visual language."
        } else {
            "Keep one consistent visual style across the carousel."
        };
        format!(
            "Design card {number} of {total} of a vertical social-media carousel ({aspect}).\n\
             This is {role}.\n\n\
             Headline: {title}\n\
             Points:\n{bullets}\n\n\
             Large legible type for phone screens, high contrast, no watermarks or page numbers. \
             {style_rule}\n{style}{extra}",
            number = input.index + 1,
            total = input.total,
            aspect = input.aspect_ratio,
            title = input.title,
            style = style_section(input.style),
            extra = extra_section(input.extra_requirements),
        )
    }

    fn infographic_blueprint(&self, input: &BlueprintPrompt<'_>) -> String {
        let mode_hint = match input.mode {
            InfographicMode::Single => "a single infographic",
            InfographicMode::Series => "one infographic of a series",
        };
        format!(
            "You are an infographic content planner. Compress the input into a structural \
             blueprint for {mode_hint}.\n\n\
             Outline:\n{outline}\n\n\
             Descriptions:\n{descriptions}\n\n\
             Current page title: {title}\n{style}{extra}\n\
             Output plain text only: blocks, each with a block title and 3-6 points. Suggest \
             data-driven forms (timelines, comparison tables, flows, key numbers). Do not \
             mention slides or page numbers.",
            outline = input.outline_text,
            descriptions = input.descriptions,
            title = input.page_title.unwrap_or("-"),
            style = style_section(input.style),
            extra = extra_section(input.extra_requirements),
        )
    }

    fn infographic_image(
        &self,
        blueprint: &str,
        mode: InfographicMode,
        page_title: Option<&str>,
        aspect_ratio: &str,
        style: Option<&str>,
    ) -> String {
        let mode_hint = match mode {
            InfographicMode::Single => "a single infographic",
            InfographicMode::Series => "one infographic of a series",
        };
        format!(
            "You are a professional infographic designer. Produce {mode_hint} from the blueprint \
             below. This is a poster-style infographic, not a slide.\n\n\
             Title: {title}\n\n\
             Blueprint:\n{blueprint}\n\n\
             Canvas aspect ratio {aspect_ratio}. Favour timelines, comparison tables, flows, key \
             numbers and icons. Dense but readable, aligned, one consistent palette. No page \
             numbers, headers, footers or watermarks.\n{style}",
            title = page_title.unwrap_or("-"),
            style = style_section(style),
        )
    }

    fn style_refinement(&self, template_style: &str, extra_requirements: Option<&str>) -> String {
        format!(
            "You are a presentation designer. Turn the user's style description into a concise, \
             actionable style guide for an automated slide generator.\n\n\
             User style description (ground truth, do not override):\n{template_style}\n{extra}\n\
             Output 8-12 plain-text bullet points covering tone, colour palette (2-4 colours), \
             typography, layout grid, imagery, iconography, data visualisation and consistency \
             rules. No headers, footers, page numbers or watermarks.",
            extra = extra_section(extra_requirements),
        )
    }
}
