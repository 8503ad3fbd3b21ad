use super::{Db, serialize_vector};
use rusqlite::{Result, params};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub source: String,
    pub page: usize,
    pub position: usize,
    pub content: String,
    pub similarity: f64,
    pub chunk_id: i64,
}

fn map_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchResult> {
    let distance: f64 = row.get(5)?;

    Ok(SearchResult {
        source: row.get(0)?,
        page: row.get::<_, i64>(1)? as usize,
        position: row.get::<_, i64>(2)? as usize,
        content: row.get(3)?,
        chunk_id: row.get(4)?,
        similarity: 1.0 - (distance / 2.0),
    })
}

impl Db {
    /// Nearest chunks of a collection by cosine distance, closest first
    pub fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.dimensions() {
            return Err(rusqlite::Error::InvalidParameterCount(
                query_vector.len(),
                self.dimensions(),
            ));
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                c.source,
                c.page,
                c.position,
                c.content,
                c.id as chunk_id,
                vec_distance_cosine(v.embedding, ?) as distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN collections col ON c.collection_id = col.id
            WHERE col.name = ?
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![serialize_vector(query_vector), collection, top_k as i64],
            map_search_row,
        )?;

        rows.collect()
    }
}
