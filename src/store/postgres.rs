use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use super::{Result, Store, StoreError, Unique};
use crate::{
	role::{Permission, Role},
	route::{
		auth::model::{NewUser, Session, UpdateProfileInput, User},
		comment::model::{Comment, CommentQuery},
		post::model::{Post, PostCounts, PostQuery},
		taxonomy::model::{Category, NewTerm, Tag},
	},
};

/// Escapes the wildcards of a `LIKE` pattern and wraps it for a
/// containment search.
fn contains_pattern(needle: &str) -> String {
	let mut pattern = String::with_capacity(needle.len() + 2);
	pattern.push('%');

	for c in needle.chars() {
		if matches!(c, '%' | '_' | '\\') {
			pattern.push('\\');
		}

		pattern.push(c);
	}

	pattern.push('%');
	pattern
}

#[derive(Debug, Clone)]
pub struct PgStore {
	pool: PgPool,
}

impl PgStore {
	pub async fn connect(url: &str) -> Result<Self> {
		Ok(Self {
			pool: PgPool::connect(url).await?,
		})
	}

	/// Applies every pending migration under `migrations/`.
	pub async fn migrate(&self) -> Result<()> {
		sqlx::migrate!().run(&self.pool).await?;
		Ok(())
	}

	async fn with_roles(&self, user: Option<User>) -> Result<Option<User>> {
		let Some(mut user) = user else {
			return Ok(None);
		};

		user.roles = sqlx::query_scalar::<_, Role>(
			r#"
				SELECT role FROM user_role
				WHERE user_id = $1
				ORDER BY role
			"#,
		)
		.bind(user.id)
		.fetch_all(&self.pool)
		.await?;

		Ok(Some(user))
	}

	async fn with_tags(&self, mut posts: Vec<Post>) -> Result<Vec<Post>> {
		if posts.is_empty() {
			return Ok(posts);
		}

		let ids = posts.iter().map(|post| post.id).collect::<Vec<_>>();
		let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
			r#"
				SELECT post_id, tag_id FROM post_tag
				WHERE post_id = ANY($1)
				ORDER BY tag_id
			"#,
		)
		.bind(&ids)
		.fetch_all(&self.pool)
		.await?;

		let mut tags = HashMap::<Uuid, Vec<Uuid>>::new();

		for (post_id, tag_id) in rows {
			tags.entry(post_id).or_default().push(tag_id);
		}

		for post in &mut posts {
			post.tag_ids = tags.remove(&post.id).unwrap_or_default();
		}

		Ok(posts)
	}

	async fn with_tag(&self, post: Option<Post>) -> Result<Option<Post>> {
		Ok(self.with_tags(post.into_iter().collect()).await?.pop())
	}

	/// Inserts a category or tag unless one with the same name exists.
	async fn get_or_create<T>(&self, table: &'static str, term: NewTerm, slug: Unique) -> Result<(T, bool)>
	where
		T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
	{
		let created = sqlx::query_as::<_, T>(&format!(
			r#"
				INSERT INTO {table} (id, name, slug)
				VALUES ($1, $2, $3)
				ON CONFLICT DO NOTHING
				RETURNING *
			"#
		))
		.bind(Uuid::new_v4())
		.bind(&term.name)
		.bind(&term.slug)
		.fetch_optional(&self.pool)
		.await
		.map_err(StoreError::from_sqlx)?;

		if let Some(item) = created {
			return Ok((item, true));
		}

		let existing = sqlx::query_as::<_, T>(&format!("SELECT * FROM {table} WHERE name = $1"))
			.bind(&term.name)
			.fetch_optional(&self.pool)
			.await?;

		// Another row holds the slug under a different name.
		existing
			.map(|item| (item, false))
			.ok_or(StoreError::Conflict(slug))
	}

	async fn replace_tags(
		tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
		post: &Post,
	) -> Result<()> {
		sqlx::query("DELETE FROM post_tag WHERE post_id = $1")
			.bind(post.id)
			.execute(&mut **tx)
			.await?;

		sqlx::query(
			r#"
				INSERT INTO post_tag (post_id, tag_id)
				SELECT $1, UNNEST($2::uuid[])
			"#,
		)
		.bind(post.id)
		.bind(&post.tag_ids)
		.execute(&mut **tx)
		.await?;

		Ok(())
	}
}

#[axum::async_trait]
impl Store for PgStore {
	async fn insert_user(&self, user: NewUser) -> Result<User> {
		let user = sqlx::query_as::<_, User>(
			r#"
				INSERT INTO "user" (id, email, username, password, first_name, last_name, is_superuser)
				VALUES ($1, $2, $3, $4, $5, $6, $7)
				RETURNING *
			"#,
		)
		.bind(user.id)
		.bind(user.email)
		.bind(user.username)
		.bind(user.password)
		.bind(user.first_name)
		.bind(user.last_name)
		.bind(user.is_superuser)
		.fetch_one(&self.pool)
		.await
		.map_err(StoreError::from_sqlx)?;

		Ok(user)
	}

	async fn register_user(&self, user: NewUser, role: Role) -> Result<(User, Session)> {
		let mut tx = self.pool.begin().await?;

		let mut user = sqlx::query_as::<_, User>(
			r#"
				INSERT INTO "user" (id, email, username, password, first_name, last_name, is_superuser)
				VALUES ($1, $2, $3, $4, $5, $6, $7)
				RETURNING *
			"#,
		)
		.bind(user.id)
		.bind(user.email)
		.bind(user.username)
		.bind(user.password)
		.bind(user.first_name)
		.bind(user.last_name)
		.bind(user.is_superuser)
		.fetch_one(&mut *tx)
		.await
		.map_err(StoreError::from_sqlx)?;

		// attaches nothing while the role is not seeded
		let assigned = sqlx::query(
			r#"
				INSERT INTO user_role (user_id, role)
				SELECT $1, name FROM role
				WHERE name = $2
			"#,
		)
		.bind(user.id)
		.bind(role)
		.execute(&mut *tx)
		.await?;

		if assigned.rows_affected() > 0 {
			user.roles.push(role);
		}

		let session = sqlx::query_as::<_, Session>(
			r#"
				INSERT INTO session (id, user_id)
				VALUES ($1, $2)
				RETURNING *
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(user.id)
		.fetch_one(&mut *tx)
		.await?;

		tx.commit().await?;

		Ok((user, session))
	}

	async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
		let user = sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE id = $1"#)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		self.with_roles(user).await
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
		let user = sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE email = $1"#)
			.bind(email)
			.fetch_optional(&self.pool)
			.await?;

		self.with_roles(user).await
	}

	async fn update_user(&self, id: Uuid, input: UpdateProfileInput) -> Result<User> {
		let user = sqlx::query_as::<_, User>(
			r#"
				UPDATE "user"
				SET
					email = COALESCE($2, email),
					first_name = CASE WHEN $3 THEN $4 ELSE first_name END,
					last_name = CASE WHEN $5 THEN $6 ELSE last_name END
				WHERE id = $1
				RETURNING *
			"#,
		)
		.bind(id)
		.bind(input.email)
		.bind(input.first_name.is_some())
		.bind(input.first_name.flatten())
		.bind(input.last_name.is_some())
		.bind(input.last_name.flatten())
		.fetch_one(&self.pool)
		.await
		.map_err(StoreError::from_sqlx)?;

		self.with_roles(Some(user))
			.await?
			.ok_or(StoreError::Database(sqlx::Error::RowNotFound))
	}

	async fn delete_user(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn admin_emails(&self) -> Result<Vec<String>> {
		let emails = sqlx::query_scalar::<_, String>(
			r#"
				SELECT DISTINCT email FROM "user"
				WHERE email <> '' AND (
					is_superuser
					OR EXISTS (
						SELECT 1 FROM user_role
						WHERE user_id = "user".id AND role = 'admin'
					)
				)
				ORDER BY email
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(emails)
	}

	async fn ensure_role(&self, role: Role, permissions: &[Permission]) -> Result<bool> {
		let codenames = permissions
			.iter()
			.map(|permission| permission.codename().to_string())
			.collect::<Vec<_>>();

		let result = sqlx::query(
			r#"
				INSERT INTO role (name, permissions)
				VALUES ($1, $2)
				ON CONFLICT (name) DO NOTHING
			"#,
		)
		.bind(role)
		.bind(codenames)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn seeded_roles(&self) -> Result<Vec<Role>> {
		let roles = sqlx::query_scalar::<_, Role>("SELECT name FROM role ORDER BY name")
			.fetch_all(&self.pool)
			.await?;

		Ok(roles)
	}

	async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<bool> {
		let seeded = sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS (SELECT 1 FROM role WHERE name = $1)",
		)
		.bind(role)
		.fetch_one(&self.pool)
		.await?;

		if !seeded {
			return Ok(false);
		}

		sqlx::query(
			r#"
				INSERT INTO user_role (user_id, role)
				VALUES ($1, $2)
				ON CONFLICT DO NOTHING
			"#,
		)
		.bind(user_id)
		.bind(role)
		.execute(&self.pool)
		.await?;

		Ok(true)
	}

	async fn create_session(&self, user_id: Uuid) -> Result<Session> {
		let session = sqlx::query_as::<_, Session>(
			r#"
				INSERT INTO session (id, user_id)
				VALUES ($1, $2)
				RETURNING *
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(user_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(session)
	}

	async fn delete_session(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM session WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn user_by_session(&self, session_id: Uuid) -> Result<Option<User>> {
		let user = sqlx::query_as::<_, User>(
			r#"
				SELECT "user".* FROM "user"
				INNER JOIN session ON session.user_id = "user".id
				WHERE session.id = $1
			"#,
		)
		.bind(session_id)
		.fetch_optional(&self.pool)
		.await?;

		self.with_roles(user).await
	}

	async fn last_comment_at(&self, session_id: Uuid, post_id: Uuid) -> Result<Option<DateTime<Utc>>> {
		let at = sqlx::query_scalar::<_, DateTime<Utc>>(
			r#"
				SELECT commented_at FROM session_comment
				WHERE session_id = $1 AND post_id = $2
			"#,
		)
		.bind(session_id)
		.bind(post_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(at)
	}

	async fn categories(&self) -> Result<Vec<Category>> {
		let categories = sqlx::query_as::<_, Category>("SELECT * FROM category ORDER BY name")
			.fetch_all(&self.pool)
			.await?;

		Ok(categories)
	}

	async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>> {
		let category = sqlx::query_as::<_, Category>("SELECT * FROM category WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(category)
	}

	async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
		let category = sqlx::query_as::<_, Category>("SELECT * FROM category WHERE slug = $1")
			.bind(slug)
			.fetch_optional(&self.pool)
			.await?;

		Ok(category)
	}

	async fn category_slug_taken(&self, slug: &str) -> Result<bool> {
		let taken = sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS (SELECT 1 FROM category WHERE slug = $1)",
		)
		.bind(slug)
		.fetch_one(&self.pool)
		.await?;

		Ok(taken)
	}

	async fn get_or_create_category(&self, term: NewTerm) -> Result<(Category, bool)> {
		self.get_or_create("category", term, Unique::CategorySlug)
			.await
	}

	async fn delete_category(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM category WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn tags(&self) -> Result<Vec<Tag>> {
		let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tag ORDER BY name")
			.fetch_all(&self.pool)
			.await?;

		Ok(tags)
	}

	async fn tags_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Tag>> {
		let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tag WHERE id = ANY($1) ORDER BY name")
			.bind(ids)
			.fetch_all(&self.pool)
			.await?;

		Ok(tags)
	}

	async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
		let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tag WHERE slug = $1")
			.bind(slug)
			.fetch_optional(&self.pool)
			.await?;

		Ok(tag)
	}

	async fn tag_slug_taken(&self, slug: &str) -> Result<bool> {
		let taken = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM tag WHERE slug = $1)")
			.bind(slug)
			.fetch_one(&self.pool)
			.await?;

		Ok(taken)
	}

	async fn get_or_create_tag(&self, term: NewTerm) -> Result<(Tag, bool)> {
		self.get_or_create("tag", term, Unique::TagSlug).await
	}

	async fn post_slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool> {
		let taken = sqlx::query_scalar::<_, bool>(
			r#"
				SELECT EXISTS (
					SELECT 1 FROM post
					WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2)
				)
			"#,
		)
		.bind(slug)
		.bind(exclude)
		.fetch_one(&self.pool)
		.await?;

		Ok(taken)
	}

	async fn insert_post(&self, post: &Post) -> Result<Post> {
		let mut tx = self.pool.begin().await?;

		let mut saved = sqlx::query_as::<_, Post>(
			r#"
				INSERT INTO post (
					id, slug, title, content, image, author_id, category_id,
					status, created_at, updated_at, published_at
				)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
				RETURNING *
			"#,
		)
		.bind(post.id)
		.bind(&post.slug)
		.bind(&post.title)
		.bind(&post.content)
		.bind(&post.image)
		.bind(post.author_id)
		.bind(post.category_id)
		.bind(post.status)
		.bind(post.created_at)
		.bind(post.updated_at)
		.bind(post.published_at)
		.fetch_one(&mut *tx)
		.await
		.map_err(StoreError::from_sqlx)?;

		Self::replace_tags(&mut tx, post).await?;
		tx.commit().await?;

		saved.tag_ids.clone_from(&post.tag_ids);
		Ok(saved)
	}

	async fn update_post(&self, post: &Post) -> Result<Post> {
		let mut tx = self.pool.begin().await?;

		let mut saved = sqlx::query_as::<_, Post>(
			r#"
				UPDATE post
				SET
					slug = $2,
					title = $3,
					content = $4,
					image = $5,
					category_id = $6,
					status = $7,
					updated_at = $8,
					published_at = $9
				WHERE id = $1
				RETURNING *
			"#,
		)
		.bind(post.id)
		.bind(&post.slug)
		.bind(&post.title)
		.bind(&post.content)
		.bind(&post.image)
		.bind(post.category_id)
		.bind(post.status)
		.bind(post.updated_at)
		.bind(post.published_at)
		.fetch_one(&mut *tx)
		.await
		.map_err(StoreError::from_sqlx)?;

		Self::replace_tags(&mut tx, post).await?;
		tx.commit().await?;

		saved.tag_ids.clone_from(&post.tag_ids);
		Ok(saved)
	}

	async fn delete_post(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM post WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn post_by_id(&self, id: Uuid) -> Result<Option<Post>> {
		let post = sqlx::query_as::<_, Post>("SELECT * FROM post WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		self.with_tag(post).await
	}

	async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
		let post = sqlx::query_as::<_, Post>("SELECT * FROM post WHERE slug = $1")
			.bind(slug)
			.fetch_optional(&self.pool)
			.await?;

		self.with_tag(post).await
	}

	async fn posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
		let posts = sqlx::query_as::<_, Post>(
			r#"
				SELECT * FROM post
				WHERE ($1::post_status IS NULL OR status = $1)
					AND ($2::uuid IS NULL OR author_id = $2)
					AND ($3::uuid IS NULL OR category_id = $3)
					AND ($4::uuid IS NULL OR EXISTS (
						SELECT 1 FROM post_tag
						WHERE post_tag.post_id = post.id AND post_tag.tag_id = $4
					))
					AND ($5::text IS NULL OR title ILIKE $5 ESCAPE '\' OR content ILIKE $5 ESCAPE '\')
					AND ($6::uuid IS NULL OR id <> $6)
				ORDER BY created_at DESC, id DESC
				LIMIT $7 OFFSET $8
			"#,
		)
		.bind(query.status)
		.bind(query.author_id)
		.bind(query.category_id)
		.bind(query.tag_id)
		.bind(query.search.as_deref().map(contains_pattern))
		.bind(query.exclude)
		.bind(query.limit)
		.bind(query.offset)
		.fetch_all(&self.pool)
		.await?;

		self.with_tags(posts).await
	}

	async fn post_counts(&self, author_id: Option<Uuid>) -> Result<PostCounts> {
		let (total, published, drafts) = sqlx::query_as::<_, (i64, i64, i64)>(
			r#"
				SELECT
					COUNT(*),
					COUNT(*) FILTER (WHERE status = 'published'),
					COUNT(*) FILTER (WHERE status = 'draft')
				FROM post
				WHERE $1::uuid IS NULL OR author_id = $1
			"#,
		)
		.bind(author_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(PostCounts {
			total,
			published,
			drafts,
		})
	}

	async fn insert_comment(&self, comment: &Comment, session_id: Option<Uuid>) -> Result<Comment> {
		let mut tx = self.pool.begin().await?;

		let inserted = sqlx::query_as::<_, Comment>(
			r#"
				INSERT INTO comment (id, post_id, user_id, content, is_approved, created_at, updated_at)
				VALUES ($1, $2, $3, $4, $5, $6, $7)
				RETURNING *
			"#,
		)
		.bind(comment.id)
		.bind(comment.post_id)
		.bind(comment.user_id)
		.bind(&comment.content)
		.bind(comment.is_approved)
		.bind(comment.created_at)
		.bind(comment.updated_at)
		.fetch_one(&mut *tx)
		.await?;

		if let Some(session_id) = session_id {
			sqlx::query(
				r#"
					INSERT INTO session_comment (session_id, post_id, commented_at)
					VALUES ($1, $2, $3)
					ON CONFLICT (session_id, post_id)
					DO UPDATE SET commented_at = EXCLUDED.commented_at
				"#,
			)
			.bind(session_id)
			.bind(inserted.post_id)
			.bind(inserted.created_at)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		Ok(inserted)
	}

	async fn comment_by_id(&self, id: Uuid) -> Result<Option<Comment>> {
		let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comment WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(comment)
	}

	async fn approve_comment(&self, id: Uuid) -> Result<Option<Comment>> {
		let comment = sqlx::query_as::<_, Comment>(
			r#"
				UPDATE comment
				SET is_approved = TRUE, updated_at = NOW()
				WHERE id = $1
				RETURNING *
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(comment)
	}

	async fn delete_comment(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM comment WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn comments(&self, query: &CommentQuery) -> Result<Vec<Comment>> {
		let comments = sqlx::query_as::<_, Comment>(
			r#"
				SELECT comment.* FROM comment
				INNER JOIN post ON post.id = comment.post_id
				WHERE ($1::uuid IS NULL OR comment.post_id = $1)
					AND ($2::uuid IS NULL OR post.author_id = $2)
					AND (NOT $3 OR comment.is_approved)
				ORDER BY comment.created_at DESC, comment.id DESC
				LIMIT $4 OFFSET $5
			"#,
		)
		.bind(query.post_id)
		.bind(query.post_author_id)
		.bind(query.approved_only)
		.bind(query.limit)
		.bind(query.offset)
		.fetch_all(&self.pool)
		.await?;

		Ok(comments)
	}

	async fn approved_comment_count(&self, post_id: Uuid) -> Result<i64> {
		let count = sqlx::query_scalar::<_, i64>(
			"SELECT COUNT(*) FROM comment WHERE post_id = $1 AND is_approved",
		)
		.bind(post_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(count)
	}
}

#[cfg(test)]
mod test {
	use super::contains_pattern;

	#[test]
	fn test_contains_pattern_escapes_wildcards() {
		assert_eq!(contains_pattern("rust"), "%rust%");
		assert_eq!(contains_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
	}
}
