//! Article resource (`/jsonapi/node/article`)

use anyhow::{bail, Context, Result};
use reqwest::Method;

use super::client::ContentClient;
use crate::models::{Article, ArticleDraft, Document};

const ARTICLES: &str = "/jsonapi/node/article";

/// Article IDs are UUIDs; anything else would escape the resource path.
fn article_path(id: &str) -> Result<String> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        bail!("Invalid article ID {:?}", id);
    }
    Ok(format!("{}/{}", ARTICLES, id))
}

/// Newest articles first.
pub async fn list_articles_data(client: &ContentClient, limit: usize) -> Result<Vec<Article>> {
    let path = format!(
        "{}?fields[node--article]=id,drupal_internal__nid,title,body&sort=-created&page[limit]={}",
        ARTICLES, limit
    );
    let resp = client.get(&path).await?;
    let doc: Document<Vec<Article>> = resp
        .json()
        .await
        .context("Failed to parse article list")?;
    Ok(doc.data)
}

pub async fn create_article(client: &ContentClient, draft: &ArticleDraft) -> Result<Article> {
    let resp = client
        .send(Method::POST, ARTICLES, &draft.to_document(None))
        .await?;
    let doc: Document<Article> = resp
        .json()
        .await
        .context("Failed to parse created article")?;
    Ok(doc.data)
}

pub async fn update_article(
    client: &ContentClient,
    id: &str,
    draft: &ArticleDraft,
) -> Result<Article> {
    let path = article_path(id)?;
    let resp = client
        .send(Method::PATCH, &path, &draft.to_document(Some(id)))
        .await?;
    let doc: Document<Article> = resp
        .json()
        .await
        .context("Failed to parse updated article")?;
    Ok(doc.data)
}

/// The site answers a successful delete with 204 No Content.
pub async fn delete_article(client: &ContentClient, id: &str) -> Result<()> {
    let path = article_path(id)?;
    let resp = client.delete(&path).await?;
    if resp.status() != reqwest::StatusCode::NO_CONTENT {
        bail!(
            "Unexpected HTTP {} deleting article {}",
            resp.status().as_u16(),
            id
        );
    }
    Ok(())
}

/// List articles (prints to stdout).
pub async fn list_articles(client: &ContentClient, limit: usize) -> Result<()> {
    let articles = list_articles_data(client, limit).await?;

    println!("\nArticles:");
    println!("{:-<60}", "");

    if articles.is_empty() {
        println!("  (no articles found)");
        return Ok(());
    }

    for article in &articles {
        match article.attributes.nid {
            Some(nid) => println!("[{}] {}", nid, article.attributes.title),
            None => println!("{}", article.attributes.title),
        }
        println!("  ID: {}", article.id);
        if let Some(ref body) = article.attributes.body {
            let text = body.value.trim();
            if !text.is_empty() {
                println!("  {}", text);
            }
        }
        println!();
    }

    Ok(())
}

pub async fn add_article(client: &ContentClient, draft: &ArticleDraft) -> Result<()> {
    let article = create_article(client, draft).await?;
    println!("Added: {} ({})", article.attributes.title, article.id);
    Ok(())
}

pub async fn edit_article(client: &ContentClient, id: &str, draft: &ArticleDraft) -> Result<()> {
    let article = update_article(client, id, draft).await?;
    println!("Updated: {} ({})", article.attributes.title, article.id);
    Ok(())
}

pub async fn remove_article(client: &ContentClient, id: &str) -> Result<()> {
    delete_article(client, id).await?;
    println!("Deleted article {}.", id);
    Ok(())
}
