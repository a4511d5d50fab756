use shared::domain::{Post, User};

const BODY_PREVIEW_CHARS: usize = 60;

/// Renders the user collection as a plain-text table, keeping only rows that
/// match the optional substring filter.
pub fn render_users(users: &[User], filter: Option<&str>) -> String {
    let rows: Vec<Vec<String>> = users
        .iter()
        .filter(|user| filter.is_none_or(|needle| user.matches(needle)))
        .map(|user| {
            vec![
                user.name.clone(),
                user.username.clone(),
                user.email.clone(),
                user.phone.clone(),
                user.website.clone(),
            ]
        })
        .collect();
    render_table(
        &["Name", "Username", "Email", "Phone", "Website"],
        rows,
        "No users found",
    )
}

/// Renders the post collection; the filter applies to titles only, matching
/// the table's visible sort key.
pub fn render_posts(posts: &[Post], filter: Option<&str>) -> String {
    let rows: Vec<Vec<String>> = posts
        .iter()
        .filter(|post| filter.is_none_or(|needle| post.matches_title(needle)))
        .map(|post| vec![post.id.0.to_string(), post.title.clone(), body_preview(post)])
        .collect();
    render_table(&["ID", "Title", "Body"], rows, "No posts found")
}

fn body_preview(post: &Post) -> String {
    let flat = post.body.replace('\n', " ");
    let mut preview: String = flat.chars().take(BODY_PREVIEW_CHARS).collect();
    if flat.chars().count() > BODY_PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

fn render_table(headers: &[&str], rows: Vec<Vec<String>>, empty_notice: &str) -> String {
    if rows.is_empty() {
        return empty_notice.to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, headers.iter().map(|h| h.to_string()), &widths);
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in rows {
        push_row(&mut out, row.into_iter(), &widths);
    }
    out
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>, widths: &[usize]) {
    let line = cells
        .enumerate()
        .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{PostId, UserId};

    fn sample_users() -> Vec<User> {
        vec![
            User {
                id: UserId(1),
                name: "Leanne Graham".into(),
                username: "Bret".into(),
                email: "Sincere@april.biz".into(),
                phone: "1-770-736-8031".into(),
                website: "hildegard.org".into(),
            },
            User {
                id: UserId(2),
                name: "Ervin Howell".into(),
                username: "Antonette".into(),
                email: "Shanna@melissa.tv".into(),
                phone: "010-692-6593".into(),
                website: "anastasia.net".into(),
            },
        ]
    }

    #[test]
    fn unfiltered_table_lists_every_user() {
        let table = render_users(&sample_users(), None);
        assert!(table.contains("Leanne Graham"));
        assert!(table.contains("Ervin Howell"));
        assert!(table.starts_with("Name"));
    }

    #[test]
    fn filter_narrows_rows_by_any_field() {
        let table = render_users(&sample_users(), Some("melissa"));
        assert!(table.contains("Ervin Howell"));
        assert!(!table.contains("Leanne Graham"));
    }

    #[test]
    fn empty_result_prints_the_placeholder() {
        assert_eq!(render_users(&sample_users(), Some("nobody")), "No users found");
        assert_eq!(render_posts(&[], None), "No posts found");
    }

    #[test]
    fn post_filter_matches_titles_only() {
        let posts = vec![Post {
            id: PostId(1),
            title: "qui est esse".into(),
            body: "dolor beatae".into(),
        }];
        assert!(render_posts(&posts, Some("esse")).contains("qui est esse"));
        assert_eq!(render_posts(&posts, Some("beatae")), "No posts found");
    }

    #[test]
    fn long_bodies_are_previewed_with_an_ellipsis() {
        let posts = vec![Post {
            id: PostId(1),
            title: "long".into(),
            body: "x".repeat(200),
        }];
        let table = render_posts(&posts, None);
        assert!(table.contains('…'));
        assert!(!table.contains(&"x".repeat(100)));
    }
}
