//! TOC/spine reconciliation: TOC entries become contiguous spine ranges.

use crate::document::{toc_chapter_id, Chapter, TocChapter};
use crate::links::HrefIndex;
use crate::path;
use crate::toc::TocEntry;

/// Map TOC entries onto inclusive spine ranges and tag each chapter with the
/// group that covers it.
///
/// Entries whose target is not a chapter are dropped, as are entries that
/// start at or before the previously kept entry (sub-sections of the same
/// document, out-of-order entries). Each kept range ends just before the
/// next kept entry; the last one ends at the final chapter. Group ids keep
/// the entry's position in the TOC.
pub fn build_toc_chapters(
    entries: &[TocEntry],
    index: &HrefIndex,
    chapters: &mut [Chapter],
) -> Vec<TocChapter> {
    let Some(last_index) = chapters.len().checked_sub(1) else {
        return Vec::new();
    };

    let mut starts: Vec<(usize, &TocEntry, usize)> = Vec::new();
    for (position, entry) in entries.iter().enumerate() {
        let target = path::normalize(entry.target());
        let Some(start) = index.get(&target) else {
            tracing::warn!("TOC entry '{}' points outside the spine ({})", entry.label, entry.href);
            continue;
        };
        if let Some(&(_, _, previous)) = starts.last() {
            if start <= previous {
                tracing::debug!(
                    "TOC entry '{}' starts at {} within the previous group, merged",
                    entry.label,
                    start
                );
                continue;
            }
        }
        starts.push((position, entry, start));
    }

    let mut groups = Vec::with_capacity(starts.len());
    for (i, &(position, entry, start)) in starts.iter().enumerate() {
        let end = starts
            .get(i + 1)
            .map_or(last_index, |&(_, _, next)| next - 1)
            .min(last_index);

        let group = TocChapter {
            id: toc_chapter_id(position),
            title: entry.label.clone(),
            start_index: start,
            end_index: end,
            href: entry.href.clone(),
        };
        tracing::debug!("TOC group '{}' covers {}..={}", group.title, start, end);

        for chapter in chapters.iter_mut().filter(|c| group.contains(c.index)) {
            chapter.toc_chapter_id = Some(group.id.clone());
        }
        groups.push(group);
    }

    groups
}

/// One group per chapter, for books without a TOC.
pub fn spine_groups(chapters: &[Chapter]) -> Vec<TocChapter> {
    chapters
        .iter()
        .map(|c| TocChapter {
            id: c.id.clone(),
            title: c.title.clone(),
            start_index: c.index,
            end_index: c.index,
            href: c.href.clone(),
        })
        .collect()
}
