use crate::record::SearchResultRecord;

/// Render a record into the chat reply.
///
/// Missing fields show the no-result sentinel. Rendering the same record
/// always yields the same text.
pub fn format_record(record: &SearchResultRecord) -> String {
    format!(
        "🔍相似度: {similarity}\n\n\
         🖼️标题: {title}\n\n\
         ✍️作者: {author}\n\
         🔗作者链接: {author_url}\n\n\
         🌐来源链接: {source}\n\n\
         📚图库链接: {url}\n\n\
         🗂️索引名称: {index_name}",
        similarity = record.similarity(),
        title = record.title(),
        author = record.author(),
        author_url = record.author_url(),
        source = record.source(),
        url = record.url(),
        index_name = record.index_name(),
    )
}
